// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Atomic persistence of formatted reports: unique naming, temp-file plus
//! rename, and the oldest-first retention prune.

use crate::shared::constants::{DD_CRASHREPORT_FILE_EXTENSION, DD_CRASHREPORT_TEMP_PREFIX};
use anyhow::Context;
use chrono::Local;
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use uuid::Uuid;

/// Persistence seam for finished reports. Swappable through the facade so
/// tests and embedders can capture reports instead of writing files.
pub trait ReportWriter: Send {
    /// Persists `contents` under `report_dir`, returning the final path, or
    /// None when the report could not be persisted.
    fn write_report(
        &self,
        report_dir: &Path,
        app_name: &str,
        contents: &str,
        max_reports: u32,
    ) -> Option<PathBuf>;
}

/// The default writer. Atomicity is the rename's; a failed write leaves no
/// partial report behind.
#[derive(Debug, Default, Clone, Copy)]
pub struct AtomicReportWriter;

impl ReportWriter for AtomicReportWriter {
    fn write_report(
        &self,
        report_dir: &Path,
        app_name: &str,
        contents: &str,
        max_reports: u32,
    ) -> Option<PathBuf> {
        match write_atomically(report_dir, app_name, contents) {
            Ok(path) => {
                if max_reports > 0 {
                    prune_oldest(report_dir, max_reports as usize)
                        .unwrap_or_else(|e| warn!("Unable to prune old crash reports: {e:#}"));
                }
                Some(path)
            }
            Err(e) => {
                warn!("Unable to persist crash report: {e:#}");
                None
            }
        }
    }
}

/// `<app with spaces as underscores>_<yyyyMMdd_HHmmss>_<pid>_<8 hex>.crash`
fn unique_report_filename(app_name: &str) -> String {
    let app = app_name.replace(' ', "_");
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let pid = std::process::id();
    let tag: u32 = rand::random();
    format!("{app}_{stamp}_{pid}_{tag:08x}.{DD_CRASHREPORT_FILE_EXTENSION}")
}

fn write_atomically(report_dir: &Path, app_name: &str, contents: &str) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(report_dir)
        .with_context(|| format!("Failed to create {}", report_dir.display()))?;
    let temp_path = report_dir.join(format!(
        "{DD_CRASHREPORT_TEMP_PREFIX}{}.{DD_CRASHREPORT_FILE_EXTENSION}",
        Uuid::new_v4()
    ));
    let final_path = report_dir.join(unique_report_filename(app_name));

    let result = fs::write(&temp_path, contents)
        .with_context(|| format!("Failed to write {}", temp_path.display()))
        .and_then(|()| {
            fs::rename(&temp_path, &final_path)
                .with_context(|| format!("Failed to rename into {}", final_path.display()))
        });
    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(final_path)
}

fn prune_oldest(report_dir: &Path, max_reports: usize) -> anyhow::Result<()> {
    let mut reports: Vec<(SystemTime, PathBuf)> = vec![];
    for entry in fs::read_dir(report_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_report = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == DD_CRASHREPORT_FILE_EXTENSION)
            .unwrap_or(false)
            && !path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(DD_CRASHREPORT_TEMP_PREFIX))
                .unwrap_or(false);
        if !is_report {
            continue;
        }
        reports.push((entry.metadata()?.modified()?, path));
    }
    if reports.len() <= max_reports {
        return Ok(());
    }
    reports.sort();
    let excess = reports.len() - max_reports;
    for (_, path) in reports.drain(..excess) {
        fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::time::Duration;

    #[test]
    fn filename_shape() {
        let pattern = Regex::new(r"^Test_App_\d{8}_\d{6}_\d+_[0-9a-f]{8}\.crash$").unwrap();
        let name = unique_report_filename("Test App");
        assert!(pattern.is_match(&name), "unexpected filename {name}");
    }

    #[test]
    fn writes_and_returns_the_final_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = AtomicReportWriter
            .write_report(dir.path(), "TestApp", "CRASH REPORT\n", 0)
            .unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "CRASH REPORT\n");
        // No temp leftovers.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let path = AtomicReportWriter
            .write_report(&nested, "TestApp", "x", 0)
            .unwrap();
        assert!(path.starts_with(&nested));
    }

    #[test]
    fn unwritable_directory_yields_none() {
        // A regular file where the directory should be.
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, "file").unwrap();
        assert!(AtomicReportWriter
            .write_report(&blocked, "TestApp", "x", 0)
            .is_none());
    }

    #[test]
    fn prune_keeps_the_newest_reports() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = vec![];
        for i in 0..4u64 {
            let path = dir.path().join(format!("app_2024010{i}_000000_1_0000000{i}.crash"));
            std::fs::write(&path, "report").unwrap();
            let file = std::fs::File::options().write(true).open(&path).unwrap();
            file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1000 + i)).unwrap();
            paths.push(path);
        }
        // The raw log and temp files are not prune candidates.
        std::fs::write(dir.path().join("pending_crash.txt"), "raw").unwrap();

        prune_oldest(dir.path(), 2).unwrap();
        assert!(!paths[0].exists());
        assert!(!paths[1].exists());
        assert!(paths[2].exists());
        assert!(paths[3].exists());
        assert!(dir.path().join("pending_crash.txt").exists());
    }
}
