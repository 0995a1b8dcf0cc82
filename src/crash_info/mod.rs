// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod format;
mod metadata;
mod report_writer;
mod stacktrace;
mod system_info;
mod thread_info;

pub use format::signal_name;
pub use metadata::ApplicationInfo;
pub use report_writer::{AtomicReportWriter, ReportWriter};
pub use stacktrace::{StackFrame, StackTrace};
pub use system_info::SystemInfo;
pub use thread_info::ThreadInfo;

pub(crate) use stacktrace::{capture_live_trace, symbolicate_addresses};

use crate::shared::configuration::{CrashReporterConfiguration, ReportFormat};
use chrono::{DateTime, Local, TimeZone};

/// A fully-composed crash report. All fields are captured at construction
/// time; formatting is a pure function of the value.
#[derive(Debug, Clone)]
pub struct CrashReport {
    pub timestamp: DateTime<Local>,
    pub signal: Option<i32>,
    pub reason: Option<String>,
    pub stacktrace: StackTrace,
    pub thread_info: ThreadInfo,
    pub system_info: SystemInfo,
    pub app_info: ApplicationInfo,
}

impl CrashReport {
    pub fn format(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::PlainText => format::to_plain_text(self),
            ReportFormat::Json => format::to_json(self),
            ReportFormat::Xml => format::to_xml(self),
        }
    }
}

/// What a report should be built from. Manual and simulated reports leave the
/// raw fields empty; recovery fills them from the parsed raw log.
#[derive(Debug, Default)]
pub(crate) struct ReportRequest<'a> {
    pub signal: Option<i32>,
    pub reason: Option<&'a str>,
    /// Raw-log crash time (seconds since epoch); `None` means now.
    pub raw_timestamp: Option<i64>,
    /// Overrides the collected current-thread id with the crashing thread's.
    pub raw_thread_id: Option<u64>,
    /// Addresses to symbolicate; empty means capture a live backtrace.
    pub raw_addresses: &'a [usize],
}

/// Composes a report from the request plus freshly-collected context.
pub(crate) fn generate_crash_report(
    request: &ReportRequest<'_>,
    config: &CrashReporterConfiguration,
    app_info: &ApplicationInfo,
) -> CrashReport {
    let timestamp = request
        .raw_timestamp
        .and_then(|seconds| Local.timestamp_opt(seconds, 0).single())
        .unwrap_or_else(Local::now);

    let stacktrace = if request.raw_addresses.is_empty() {
        capture_live_trace(config.include_symbolication)
    } else {
        symbolicate_addresses(request.raw_addresses, config.include_symbolication)
    };

    let mut thread_info = ThreadInfo::collect(config.detail_level);
    if let Some(thread_id) = request.raw_thread_id {
        thread_info.current_thread_id = thread_id;
    }

    CrashReport {
        timestamp,
        signal: request.signal,
        reason: request.reason.map(str::to_string),
        stacktrace,
        thread_info,
        system_info: SystemInfo::collect(config.detail_level),
        app_info: app_info.clone(),
    }
}
