// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Line-oriented parser for the pending raw-log record.
//!
//! Both accepted dialects are parsed: the canonical one the emitter writes
//! (`Frames (raw addresses):` / `--- C Minimal Report End ---`) and the
//! alternative one (`Frames:` / `--- End of Raw Report ---`). Field order may
//! vary and unknown lines are ignored; only `Signal` is mandatory, which the
//! orchestrator enforces.

use crate::shared::constants::*;

/// The facts the signal phase persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RawCrashLog {
    pub signal: Option<i32>,
    pub timestamp: Option<i64>,
    pub thread_id: Option<u64>,
    pub frame_count: Option<i32>,
    /// Raw addresses in capture order; 0 marks a nil slot.
    pub frames: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParseState {
    Fields,
    Frames,
    Done,
}

pub(crate) fn parse_raw_log(contents: &str) -> RawCrashLog {
    let mut log = RawCrashLog::default();
    let mut state = ParseState::Fields;
    for line in contents.lines() {
        state = process_line(&mut log, line, state);
        if state == ParseState::Done {
            break;
        }
    }
    log
}

fn process_line(log: &mut RawCrashLog, line: &str, state: ParseState) -> ParseState {
    if line == DD_CRASHREPORT_END || line == DD_CRASHREPORT_END_ALT {
        return ParseState::Done;
    }
    if let Some(value) = line.strip_prefix(DD_CRASHREPORT_SIGNAL_PREFIX) {
        log.signal = value.trim().parse().ok().or(log.signal);
        return state;
    }
    if let Some(value) = line.strip_prefix(DD_CRASHREPORT_TIMESTAMP_PREFIX) {
        log.timestamp = value.trim().parse().ok().or(log.timestamp);
        return state;
    }
    if let Some(value) = line.strip_prefix(DD_CRASHREPORT_THREAD_ID_PREFIX) {
        log.thread_id = value.trim().parse().ok().or(log.thread_id);
        return state;
    }
    if let Some(value) = line.strip_prefix(DD_CRASHREPORT_FRAMES_COUNT_PREFIX) {
        log.frame_count = value.trim().parse().ok().or(log.frame_count);
        return state;
    }
    if line == DD_CRASHREPORT_FRAMES_HEADER || line == DD_CRASHREPORT_FRAMES_HEADER_ALT {
        return ParseState::Frames;
    }
    if state == ParseState::Frames {
        if let Some(address) = parse_frame_line(line) {
            log.frames.push(address);
            return ParseState::Frames;
        }
    }
    // Unknown lines are ignored.
    state
}

fn parse_frame_line(line: &str) -> Option<usize> {
    let line = line.trim();
    let line = line.strip_suffix(" (nil)").unwrap_or(line);
    let hex = line.strip_prefix("0x")?;
    usize::from_str_radix(hex, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::emitters::emit_raw_record;
    use std::io::{Read, Seek, SeekFrom};
    use std::os::unix::io::AsRawFd;

    #[test]
    fn canonical_dialect() {
        let record = "Signal: 11\n\
                      Timestamp: 1700000000\n\
                      ThreadID: 42\n\
                      Frames_count: 2\n\
                      Frames (raw addresses):\n\
                      \x20 0x4005a0\n\
                      \x20 0x0 (nil)\n\
                      --- C Minimal Report End ---\n";
        let log = parse_raw_log(record);
        assert_eq!(log.signal, Some(11));
        assert_eq!(log.timestamp, Some(1700000000));
        assert_eq!(log.thread_id, Some(42));
        assert_eq!(log.frame_count, Some(2));
        assert_eq!(log.frames, vec![0x4005a0, 0]);
    }

    #[test]
    fn alternative_dialect() {
        let record = "Signal: 6\n\
                      Timestamp: 1700000001\n\
                      ThreadID: 7\n\
                      Frames:\n\
                      \x20 0x1000\n\
                      --- End of Raw Report ---\n";
        let log = parse_raw_log(record);
        assert_eq!(log.signal, Some(6));
        assert_eq!(log.frames, vec![0x1000]);
    }

    #[test]
    fn field_order_variation_and_unknown_lines() {
        let record = "Comment: ignored\n\
                      ThreadID: 9\n\
                      Signal: 4\n\
                      Garbage\n\
                      Timestamp: 5\n";
        let log = parse_raw_log(record);
        assert_eq!(log.signal, Some(4));
        assert_eq!(log.timestamp, Some(5));
        assert_eq!(log.thread_id, Some(9));
        assert!(log.frames.is_empty());
    }

    #[test]
    fn frame_lines_before_the_header_are_ignored() {
        let record = "  0x1000\nFrames:\n  0x2000\n";
        let log = parse_raw_log(record);
        assert_eq!(log.frames, vec![0x2000]);
    }

    #[test]
    fn content_after_the_terminator_is_ignored() {
        let record = "Signal: 11\n--- End of Raw Report ---\nSignal: 12\n";
        let log = parse_raw_log(record);
        assert_eq!(log.signal, Some(11));
    }

    #[test]
    fn missing_signal_parses_but_stays_none() {
        let log = parse_raw_log("Timestamp: 1700000000\n");
        assert_eq!(log.signal, None);
        assert_eq!(log.timestamp, Some(1700000000));
    }

    #[test]
    fn unparseable_values_are_skipped() {
        let log = parse_raw_log("Signal: abc\nThreadID: -1\n");
        assert_eq!(log.signal, None);
        assert_eq!(log.thread_id, None);
    }

    // Round-trip: whatever the canonical emitter writes, this parser
    // recovers exactly.
    #[test]
    fn round_trips_the_canonical_emitter() {
        let frames = [0x4005a0usize, 0, 0x7fff_0000_1234, usize::MAX];
        let mut file = tempfile::tempfile().unwrap();
        emit_raw_record(file.as_raw_fd(), 11, 1700000000, 0xdead_beef, &frames);
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut record = String::new();
        file.read_to_string(&mut record).unwrap();

        let log = parse_raw_log(&record);
        assert_eq!(log.signal, Some(11));
        assert_eq!(log.timestamp, Some(1700000000));
        assert_eq!(log.thread_id, Some(0xdead_beef));
        assert_eq!(log.frame_count, Some(frames.len() as i32));
        assert_eq!(log.frames, frames);
    }
}
