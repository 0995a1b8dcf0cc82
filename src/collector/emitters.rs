// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Emission of the single raw-log record, canonical dialect.

use super::min_writer::{fsync, write_i32, write_i64, write_literal, write_ptr, write_u64};
use crate::shared::constants::*;
use std::os::unix::io::RawFd;

/// Writes one complete raw record to `fd` and fsyncs it.
///
/// SIGNAL SAFETY:
///     Only touches stack buffers and the two permitted syscalls (`write`,
///     `fsync`) through the minimal writer. Safe to call from the fatal-signal
///     handler; also callable from normal code to fabricate a pending record
///     for recovery testing.
pub(crate) fn emit_raw_record(
    fd: RawFd,
    signal: i32,
    timestamp: i64,
    thread_id: u64,
    frames: &[usize],
) {
    if fd < 0 {
        return;
    }
    write_literal(fd, DD_CRASHREPORT_SIGNAL_PREFIX.as_bytes());
    write_i32(fd, signal);
    write_literal(fd, b"\n");

    write_literal(fd, DD_CRASHREPORT_TIMESTAMP_PREFIX.as_bytes());
    write_i64(fd, timestamp);
    write_literal(fd, b"\n");

    write_literal(fd, DD_CRASHREPORT_THREAD_ID_PREFIX.as_bytes());
    write_u64(fd, thread_id);
    write_literal(fd, b"\n");

    write_literal(fd, DD_CRASHREPORT_FRAMES_COUNT_PREFIX.as_bytes());
    write_i32(fd, frames.len() as i32);
    write_literal(fd, b"\n");

    write_literal(fd, DD_CRASHREPORT_FRAMES_HEADER.as_bytes());
    write_literal(fd, b"\n");
    for &frame in frames {
        if frame != 0 {
            write_literal(fd, b"  ");
            write_ptr(fd, frame);
            write_literal(fd, b"\n");
        } else {
            write_literal(fd, DD_CRASHREPORT_NIL_FRAME_LINE.as_bytes());
            write_literal(fd, b"\n");
        }
    }

    write_literal(fd, DD_CRASHREPORT_END.as_bytes());
    write_literal(fd, b"\n");
    fsync(fd);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom};
    use std::os::unix::io::AsRawFd;

    fn emit_to_string(
        signal: i32,
        timestamp: i64,
        thread_id: u64,
        frames: &[usize],
    ) -> String {
        let mut file = tempfile::tempfile().unwrap();
        emit_raw_record(file.as_raw_fd(), signal, timestamp, thread_id, frames);
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn canonical_record_shape() {
        let record = emit_to_string(11, 1700000000, 42, &[0x4005a0, 0, 0x7f00deadbeef]);
        assert_eq!(
            record,
            "Signal: 11\n\
             Timestamp: 1700000000\n\
             ThreadID: 42\n\
             Frames_count: 3\n\
             Frames (raw addresses):\n\
             \x20 0x4005a0\n\
             \x20 0x0 (nil)\n\
             \x20 0x7f00deadbeef\n\
             --- C Minimal Report End ---\n"
        );
    }

    #[test]
    fn empty_frame_list() {
        let record = emit_to_string(6, 0, 1, &[]);
        assert!(record.contains("Frames_count: 0\n"));
        assert!(record.ends_with("--- C Minimal Report End ---\n"));
    }
}
