// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// On-disk encoding of a finished crash report.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    #[default]
    PlainText,
    Json,
    Xml,
}

/// How much context the recovery-phase collectors gather.
/// `Minimal` keeps reports to the fixed fields, `Extended` additionally
/// records process-level facts (pid, resident/virtual size where available).
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetailLevel {
    Minimal,
    #[default]
    Standard,
    Extended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashReporterConfiguration {
    pub format: ReportFormat,
    pub detail_level: DetailLevel,
    /// Retained-report cap, enforced oldest-first after each write. 0 means
    /// unlimited.
    pub max_reports: u32,
    /// Gates the external `addr2line` helper during symbolication.
    pub include_symbolication: bool,
    pub create_alt_stack: bool,
    pub use_alt_stack: bool,
}

impl CrashReporterConfiguration {
    pub fn new(
        format: ReportFormat,
        detail_level: DetailLevel,
        max_reports: u32,
        include_symbolication: bool,
        create_alt_stack: bool,
        use_alt_stack: bool,
    ) -> anyhow::Result<Self> {
        // Requesting to create, but not use, the altstack is considered paradoxical.
        anyhow::ensure!(
            !create_alt_stack || use_alt_stack,
            "Cannot create an altstack without using it"
        );
        Ok(Self {
            format,
            detail_level,
            max_reports,
            include_symbolication,
            create_alt_stack,
            use_alt_stack,
        })
    }
}

impl Default for CrashReporterConfiguration {
    fn default() -> Self {
        Self {
            format: ReportFormat::default(),
            detail_level: DetailLevel::default(),
            max_reports: 10,
            include_symbolication: true,
            create_alt_stack: false,
            // SA_ONSTACK is safe even when no altstack was installed, so
            // defaulting this on costs nothing.
            use_alt_stack: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CrashReporterConfiguration::default();
        assert_eq!(config.format, ReportFormat::PlainText);
        assert_eq!(config.detail_level, DetailLevel::Standard);
        assert_eq!(config.max_reports, 10);
        assert!(config.include_symbolication);
        assert!(!config.create_alt_stack);
    }

    #[test]
    fn create_without_use_is_rejected() {
        let result = CrashReporterConfiguration::new(
            ReportFormat::Json,
            DetailLevel::Standard,
            0,
            false,
            true,
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn round_trips_through_serde() {
        let config = CrashReporterConfiguration::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: CrashReporterConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
