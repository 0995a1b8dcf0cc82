// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The fatal-signal handler body.
//!
//! Note that this file restricts itself to the following async-signal safe
//! operations, per <https://man7.org/linux/man-pages/man7/signal-safety.7.html>:
//! - reading the pre-opened raw-log fd and the pre-allocated frame buffer
//! - backtrace (frame walking only, no resolution)
//! - time
//! - write, fsync (through the minimal writer)
//! - sigaction, raise (through the re-raise epilogue)
//!
//! No heap allocation, no mutexes, no calls back into user code.

use super::emitters::emit_raw_record;
use super::raw_log;
use super::signal_handler_manager::restore_and_reraise;
use super::stack_capture::{collect_raw_backtrace, current_thread_id};
use crate::shared::constants::DD_CRASHREPORT_MAX_FRAMES;
use libc::{c_void, siginfo_t};
use std::ptr;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::atomic::{AtomicBool, AtomicU64};

// Written only from within the handler, which the one-shot guard below limits
// to a single invocation per process.
static mut FRAME_BUFFER: [usize; DD_CRASHREPORT_MAX_FRAMES] = [0; DD_CRASHREPORT_MAX_FRAMES];

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Turns signal-phase capture into a no-op without unregistering handlers.
/// Delivery of a fatal signal still re-raises, so the process terminates the
/// same way it would have without the reporter.
///
/// # Atomicity
///   This function is atomic and idempotent. Calling it multiple times is
///   allowed.
pub fn disable() {
    ENABLED.store(false, SeqCst);
}

/// Re-enables signal-phase capture after [disable].
///
/// # Atomicity
///   This function is atomic and idempotent. Calling it multiple times is
///   allowed.
pub fn enable() {
    ENABLED.store(true, SeqCst);
}

pub(crate) extern "C" fn handle_posix_sigaction(
    signum: i32,
    _sig_info: *mut siginfo_t,
    _ucontext: *mut c_void,
) {
    capture_raw_record(signum);
    // The handler must not return to user code: restore the previous
    // disposition and let the redelivered signal terminate the process.
    // SAFETY: This is the handler's final action.
    unsafe { restore_and_reraise(signum) };
}

fn capture_raw_record(signum: i32) {
    if !ENABLED.load(SeqCst) {
        return;
    }

    // One-time guard to guarantee at most one raw record per process. A
    // second fatal signal (e.g. a crash inside this very path) must not
    // overwrite the record that the next start is going to recover.
    static NUM_TIMES_CALLED: AtomicU64 = AtomicU64::new(0);
    if NUM_TIMES_CALLED.fetch_add(1, SeqCst) > 0 {
        return;
    }

    let fd = raw_log::fd();
    if fd < 0 {
        // Raw-log open failed at install time; stay silent rather than risk
        // unsafe recovery attempts here.
        return;
    }

    // SAFETY: time(2) with a null pointer only reads the clock.
    let timestamp = unsafe { libc::time(ptr::null_mut()) } as i64;
    let thread_id = current_thread_id();

    // SAFETY: The one-shot guard above makes this the only writer, and the
    // buffer is statically allocated so capture performs no allocation.
    let frames = unsafe {
        let buffer = &mut *ptr::addr_of_mut!(FRAME_BUFFER);
        let count = collect_raw_backtrace(buffer);
        &buffer[..count]
    };

    emit_raw_record(fd, signum, timestamp, thread_id, frames);
}
