// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Process-wide facade. Signal handlers are process-global, so there is one
//! reporter per process, reached through free functions; a single lock
//! serializes configuration against install/uninstall and report generation.
//!
//! None of these entry points propagates errors: fallible operations return
//! an optional path or a boolean, and failure detail goes to the log.

use crate::collector::{emitters, raw_log, signal_handler_manager, stack_capture};
use crate::crash_info::{
    generate_crash_report, ApplicationInfo, AtomicReportWriter, ReportRequest, ReportWriter,
};
use crate::recovery;
use crate::shared::configuration::CrashReporterConfiguration;
use log::warn;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::{Mutex, MutexGuard};

struct Reporter {
    app_info: ApplicationInfo,
    report_dir: Option<PathBuf>,
    config: CrashReporterConfiguration,
    writer: Box<dyn ReportWriter>,
}

impl Reporter {
    fn new(app_info: ApplicationInfo, report_dir: Option<PathBuf>) -> Self {
        Self {
            app_info,
            report_dir,
            config: CrashReporterConfiguration::default(),
            writer: Box::new(AtomicReportWriter),
        }
    }
}

static REPORTER: Mutex<Option<Reporter>> = Mutex::new(None);

fn lock() -> MutexGuard<'static, Option<Reporter>> {
    REPORTER.lock().unwrap_or_else(|e| e.into_inner())
}

/// Initializes (or re-initializes) the reporter with the application identity
/// and the report directory. Resets any previously-set configuration and
/// custom writer. When handlers are already installed and the directory
/// changes, the raw log is re-opened at the new location.
///
/// Call order on startup matters: `configure`, then
/// [process_pending_raw_crash_report], then [install_handlers]. Installation
/// truncates the raw log, so recovery must happen first.
pub fn configure(
    name: &str,
    version: &str,
    executable_path: Option<&str>,
    report_dir: Option<&Path>,
) {
    let app_info = ApplicationInfo::new(name, version, executable_path.map(str::to_string));
    let report_dir = report_dir.map(Path::to_path_buf);
    let mut guard = lock();
    *guard = Some(Reporter::new(app_info, report_dir.clone()));
    if signal_handler_manager::handlers_installed() {
        match &report_dir {
            Some(dir) => {
                if let Err(e) = raw_log::open(dir) {
                    warn!("Raw log unavailable, signal-phase capture disabled: {e:#}");
                }
            }
            None => raw_log::close(),
        }
    }
}

/// Replaces the reporter configuration. Returns false when [configure] has
/// not run yet.
pub fn set_configuration(config: CrashReporterConfiguration) -> bool {
    let mut guard = lock();
    match guard.as_mut() {
        Some(reporter) => {
            reporter.config = config;
            true
        }
        None => false,
    }
}

/// Swaps the persistence seam used for finished reports.
pub fn set_report_writer(writer: Box<dyn ReportWriter>) -> bool {
    let mut guard = lock();
    match guard.as_mut() {
        Some(reporter) => {
            reporter.writer = writer;
            true
        }
        None => false,
    }
}

/// Opens the raw log (truncating stale content) and registers handlers for
/// the fatal signal set. Per-signal registration failures are tolerated and
/// leave the remaining handlers active; false means registration could not
/// start at all, or the reporter is not configured. Idempotent while
/// installed.
pub fn install_handlers() -> bool {
    let mut guard = lock();
    let Some(reporter) = guard.as_mut() else {
        warn!("install_handlers called before configure");
        return false;
    };
    if signal_handler_manager::handlers_installed() {
        return true;
    }
    match &reporter.report_dir {
        Some(dir) => {
            if let Err(e) = raw_log::open(dir) {
                warn!("Raw log unavailable, signal-phase capture disabled: {e:#}");
            }
        }
        None => warn!("No report directory configured, signal-phase capture disabled"),
    }
    match signal_handler_manager::install(&reporter.config) {
        Ok(()) => true,
        Err(e) => {
            warn!("Unable to install crash handlers: {e:#}");
            false
        }
    }
}

/// Restores the previous disposition of every trapped signal. Returns false
/// when handlers were not installed.
pub fn uninstall_handlers() -> bool {
    let _guard = lock();
    match signal_handler_manager::uninstall() {
        Ok(()) => true,
        Err(e) => {
            warn!("Unable to uninstall crash handlers: {e:#}");
            false
        }
    }
}

pub fn is_installed() -> bool {
    signal_handler_manager::handlers_installed()
}

/// Whether the signal phase has a usable raw-log fd. False after an open
/// failure was recorded internally.
pub fn raw_log_available() -> bool {
    raw_log::is_open()
}

/// Writes a crash report for the current state of the process, with a live
/// backtrace of the calling thread. Returns the report path, or None when
/// unconfigured or persistence failed.
pub fn write_crash_report(reason: Option<&str>) -> Option<PathBuf> {
    generate_and_write(&ReportRequest {
        reason,
        ..Default::default()
    })
}

/// Synthesizes a report as if `signal` had been caught, without raising it.
/// Intended for testing integration end to end.
pub fn simulate_signal(signal: i32) -> Option<PathBuf> {
    generate_and_write(&ReportRequest {
        signal: Some(signal),
        reason: Some("Simulated signal"),
        ..Default::default()
    })
}

/// Fabricates a signal-phase raw record for `signal` on the live raw-log fd,
/// without raising anything. Requires installed handlers (that is what opens
/// the fd). Lets harnesses exercise the recovery path with a record produced
/// by the real emitter.
pub fn write_raw_crash_record(signal: i32) -> bool {
    let _guard = lock();
    let fd = raw_log::fd();
    if fd < 0 {
        warn!("No raw log open; cannot write a raw crash record");
        return false;
    }
    // SAFETY: time(2) with a null pointer only reads the clock.
    let timestamp = unsafe { libc::time(ptr::null_mut()) } as i64;
    let thread_id = stack_capture::current_thread_id();
    let addresses = stack_capture::collect_live_backtrace();
    emitters::emit_raw_record(fd, signal, timestamp, thread_id, &addresses);
    true
}

/// Detects, recovers, and deletes a pending raw log from a previous run.
/// Returns the final report path, or None when there was nothing to recover,
/// the raw log was malformed, or the reporter is unconfigured.
pub fn process_pending_raw_crash_report() -> Option<PathBuf> {
    let guard = lock();
    let reporter = guard.as_ref()?;
    let dir = reporter.report_dir.clone()?;
    recovery::process_pending_raw_crash_report(
        &dir,
        &reporter.config,
        &reporter.app_info,
        reporter.writer.as_ref(),
    )
}

fn generate_and_write(request: &ReportRequest<'_>) -> Option<PathBuf> {
    let guard = lock();
    let reporter = guard.as_ref()?;
    let dir = reporter.report_dir.clone()?;
    let report = generate_crash_report(request, &reporter.config, &reporter.app_info);
    let formatted = report.format(reporter.config.format);
    reporter
        .writer
        .write_report(&dir, &reporter.app_info.name, &formatted, reporter.config.max_reports)
}
