// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Fixed name of the raw log inside the report directory. At most one raw
/// record exists at a time; the file is truncated when handlers are installed.
pub const DD_CRASHREPORT_RAW_LOG_FILENAME: &str = "pending_crash.txt";

/// Capacity of the pre-allocated signal-phase frame buffer. Deeper stacks are
/// truncated without error.
pub const DD_CRASHREPORT_MAX_FRAMES: usize = 128;

pub const DD_CRASHREPORT_SIGNAL_PREFIX: &str = "Signal: ";
pub const DD_CRASHREPORT_TIMESTAMP_PREFIX: &str = "Timestamp: ";
pub const DD_CRASHREPORT_THREAD_ID_PREFIX: &str = "ThreadID: ";
pub const DD_CRASHREPORT_FRAMES_COUNT_PREFIX: &str = "Frames_count: ";

/// Frame-list header written by the canonical emitter.
pub const DD_CRASHREPORT_FRAMES_HEADER: &str = "Frames (raw addresses):";
/// Frame-list header of the alternative raw-log dialect. Parsed, never emitted.
pub const DD_CRASHREPORT_FRAMES_HEADER_ALT: &str = "Frames:";

/// Rendering of a null frame slot inside the frame list.
pub const DD_CRASHREPORT_NIL_FRAME_LINE: &str = "  0x0 (nil)";

/// Record terminator written by the canonical emitter.
pub const DD_CRASHREPORT_END: &str = "--- C Minimal Report End ---";
/// Record terminator of the alternative raw-log dialect. Parsed, never emitted.
pub const DD_CRASHREPORT_END_ALT: &str = "--- End of Raw Report ---";

pub const DD_CRASHREPORT_FILE_EXTENSION: &str = "crash";
pub const DD_CRASHREPORT_TEMP_PREFIX: &str = "temp_";

pub const DD_CRASHREPORT_ADDR2LINE_PATH: &str = "/usr/bin/addr2line";
/// Per-frame cap on the external symbolication helper.
pub const DD_CRASHREPORT_ADDR2LINE_TIMEOUT_MS: u64 = 2000;
