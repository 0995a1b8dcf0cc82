// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! This crate implements a crash reporter for long-running native processes,
//! based on catching fatal UNIX signals (SIGABRT, SIGILL, SIGSEGV, SIGFPE,
//! SIGBUS, SIGPIPE).
//!
//! Architecturally, it consists of two phases:
//! 1. The signal phase. A handler catches the fatal signal and runs under a
//!    constrained environment where many standard operations are illegal.
//!    <https://man7.org/linux/man-pages/man7/signal-safety.7.html>
//!    In particular, memory allocation and synchronization such as mutexes
//!    are potentially UB. The handler therefore does as little as possible:
//!    it persists the essential crash facts (signal number, timestamp,
//!    crashing thread id, raw return addresses) to a pre-opened raw-log fd
//!    through a hand-rolled integer/pointer formatter, fsyncs, restores the
//!    previous signal disposition, and re-raises so the process terminates
//!    the way it would have without the reporter (preserving core dumps).
//! 2. The recovery phase. On the next normal start the pending raw log is
//!    parsed, its addresses are symbolicated against the currently loaded
//!    modules, fresh system/thread/application context is collected, and a
//!    full report is written atomically under a unique name before the raw
//!    log is deleted.
//!
//! The startup order matters, and is the caller's responsibility:
//!
//! ```no_run
//! use std::path::Path;
//!
//! datadog_crashreporter::configure("my-service", "1.2.3", None, Some(Path::new("/var/crash")));
//! datadog_crashreporter::process_pending_raw_crash_report();
//! datadog_crashreporter::install_handlers();
//! // ... run ...
//! datadog_crashreporter::uninstall_handlers();
//! ```
//!
//! Installing handlers re-opens and truncates the raw log, so recovery must
//! complete first.

#![cfg(unix)]

mod api;
mod collector;
mod crash_info;
mod recovery;
mod shared;

pub use api::{
    configure, install_handlers, is_installed, process_pending_raw_crash_report,
    raw_log_available, set_configuration, set_report_writer, simulate_signal, uninstall_handlers,
    write_crash_report, write_raw_crash_record,
};
pub use collector::{disable, enable};
pub use crash_info::{
    signal_name, ApplicationInfo, AtomicReportWriter, CrashReport, ReportWriter, StackFrame,
    StackTrace, SystemInfo, ThreadInfo,
};
pub use shared::configuration::{CrashReporterConfiguration, DetailLevel, ReportFormat};
