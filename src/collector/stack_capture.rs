// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Collection of raw return addresses and the current-thread id.
//!
//! The signal-phase entry point writes into a caller-supplied fixed buffer so
//! no allocation happens during capture; the live variant is for manual and
//! simulated reports where the full runtime is available.

use crate::shared::constants::DD_CRASHREPORT_MAX_FRAMES;

/// Fills `out` with return addresses for the current thread, innermost first,
/// and returns how many were captured. Deeper stacks are truncated to the
/// buffer capacity.
///
/// SIGNAL SAFETY:
///     Walking the frames without resolving them avoids the allocations that
///     make full backtrace collection unsafe in a handler.
///     <https://github.com/rust-lang/backtrace-rs/issues/414>
pub(crate) unsafe fn collect_raw_backtrace(out: &mut [usize]) -> usize {
    let mut count = 0;
    backtrace::trace_unsynchronized(|frame| {
        if count >= out.len() {
            return false;
        }
        out[count] = frame.ip() as usize;
        count += 1;
        true
    });
    count
}

/// Live capture for recovery-phase report generation.
pub(crate) fn collect_live_backtrace() -> Vec<usize> {
    let mut addresses = Vec::with_capacity(DD_CRASHREPORT_MAX_FRAMES);
    backtrace::trace(|frame| {
        if addresses.len() >= DD_CRASHREPORT_MAX_FRAMES {
            return false;
        }
        addresses.push(frame.ip() as usize);
        true
    });
    addresses
}

/// Async-signal-safe id of the calling thread.
#[cfg(target_os = "linux")]
pub(crate) fn current_thread_id() -> u64 {
    // The pthread value is opaque but unique within the process.
    unsafe { libc::pthread_self() as u64 }
}

/// Async-signal-safe id of the calling thread.
#[cfg(target_os = "macos")]
pub(crate) fn current_thread_id() -> u64 {
    // The mach thread port for the current pthread.
    unsafe { libc::pthread_mach_thread_np(libc::pthread_self()) as u64 }
}
