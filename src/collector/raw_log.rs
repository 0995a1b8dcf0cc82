// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Owns the fixed-name raw-log file and its pre-opened fd.
//!
//! The fd is opened when handlers are installed and held for the rest of the
//! process lifetime: the signal handler reads it at an arbitrary point, so no
//! normal code path may close it. The only exception is re-configuration,
//! which swaps in a replacement fd before closing the old one.

use crate::shared::constants::DD_CRASHREPORT_RAW_LOG_FILENAME;
use anyhow::Context;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{IntoRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering::SeqCst;

static RAW_LOG_FD: AtomicI32 = AtomicI32::new(-1);

pub(crate) fn raw_log_path(report_dir: &Path) -> PathBuf {
    report_dir.join(DD_CRASHREPORT_RAW_LOG_FILENAME)
}

/// Opens the raw log under `report_dir` (create+read-write+truncate, mode
/// 0700) and publishes its fd for the signal phase. Any previously-held fd is
/// closed after the swap. On failure the stored fd becomes invalid and the
/// signal phase degrades to a silent no-op.
pub(crate) fn open(report_dir: &Path) -> anyhow::Result<()> {
    let result = try_open(report_dir);
    if result.is_err() {
        close();
    }
    result
}

fn try_open(report_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(report_dir)
        .with_context(|| format!("Failed to create {}", report_dir.display()))?;
    let path = raw_log_path(report_dir);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(true)
        .mode(0o700)
        .open(&path)
        .with_context(|| format!("Failed to open raw log {}", path.display()))?;
    let old = RAW_LOG_FD.swap(file.into_raw_fd(), SeqCst);
    if old >= 0 {
        // SAFETY: only fds produced by the open above are ever stored.
        unsafe { libc::close(old) };
    }
    Ok(())
}

/// The fd the handler writes to. Negative means capture is disabled.
pub(crate) fn fd() -> RawFd {
    RAW_LOG_FD.load(SeqCst)
}

pub(crate) fn is_open() -> bool {
    fd() >= 0
}

pub(crate) fn close() {
    let old = RAW_LOG_FD.swap(-1, SeqCst);
    if old >= 0 {
        // SAFETY: only fds produced by `try_open` are ever stored.
        unsafe { libc::close(old) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A single test because the fd slot is process-global state.
    #[test]
    fn fd_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = raw_log_path(dir.path());
        std::fs::write(&path, "stale record").unwrap();

        open(dir.path()).unwrap();
        assert!(is_open());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        // A report directory that cannot be created: a regular file in the way.
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, "file, not dir").unwrap();
        assert!(open(&blocked).is_err());
        assert!(!is_open());

        close();
        assert!(!is_open());
    }
}
