// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Next-start recovery: detects a pending raw log, re-hydrates it into a full
//! report, persists the report, and deletes the raw log.
//!
//! Callers must run this before installing handlers; installation re-opens
//! and truncates the raw log.

mod raw_report;

use raw_report::parse_raw_log;

use crate::collector::raw_log;
use crate::crash_info::{generate_crash_report, ApplicationInfo, ReportRequest, ReportWriter};
use crate::shared::configuration::CrashReporterConfiguration;
use log::{debug, warn};
use std::path::{Path, PathBuf};

pub(crate) const RECOVERED_REASON: &str = "Crash (recovered from raw log)";

/// Returns the final report path, or None when there was nothing to recover
/// or recovery failed. The raw log is unlinked on every path that found one.
pub(crate) fn process_pending_raw_crash_report(
    report_dir: &Path,
    config: &CrashReporterConfiguration,
    app_info: &ApplicationInfo,
    writer: &dyn ReportWriter,
) -> Option<PathBuf> {
    let path = raw_log::raw_log_path(report_dir);
    if !path.exists() {
        return None;
    }

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!("Unable to read pending raw log {}: {e}", path.display());
            remove_raw_log(&path);
            return None;
        }
    };

    let raw = parse_raw_log(&contents);
    let Some(signal) = raw.signal else {
        warn!("Pending raw log {} is malformed, discarding it", path.display());
        remove_raw_log(&path);
        return None;
    };

    debug!(
        "Recovering a crash report for signal {signal} from {}",
        path.display()
    );
    let report = generate_crash_report(
        &ReportRequest {
            signal: Some(signal),
            reason: Some(RECOVERED_REASON),
            raw_timestamp: raw.timestamp,
            raw_thread_id: raw.thread_id,
            raw_addresses: &raw.frames,
        },
        config,
        app_info,
    );
    let formatted = report.format(config.format);
    let written = writer.write_report(report_dir, &app_info.name, &formatted, config.max_reports);

    remove_raw_log(&path);
    written
}

fn remove_raw_log(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!("Unable to remove the raw log {}: {e}", path.display());
    }
}
