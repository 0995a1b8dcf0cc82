// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Recovery-phase collector for thread facts. Like the system collector it
//! never fails; errors end up as text inside the free-form details field.

use crate::collector::stack_capture::current_thread_id;
use crate::shared::configuration::DetailLevel;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub current_thread_id: u64,
    /// Total thread count at collection time.
    pub thread_count: u32,
    /// Free-form multi-line per-thread diagnostics.
    pub details: String,
}

impl ThreadInfo {
    pub fn collect(detail_level: DetailLevel) -> Self {
        let (thread_count, details) = enumerate_threads();
        Self {
            current_thread_id: current_thread_id(),
            thread_count,
            details: if detail_level == DetailLevel::Minimal {
                String::new()
            } else {
                details
            },
        }
    }
}

impl Default for ThreadInfo {
    fn default() -> Self {
        Self {
            current_thread_id: 0,
            thread_count: 1,
            details: String::new(),
        }
    }
}

#[cfg(target_os = "linux")]
fn enumerate_threads() -> (u32, String) {
    let entries = match std::fs::read_dir("/proc/self/task") {
        Ok(entries) => entries,
        Err(e) => return (1, format!("Unable to enumerate threads: {e}")),
    };
    let mut count = 0u32;
    let mut details = String::new();
    for entry in entries.flatten() {
        count += 1;
        let tid = entry.file_name().to_string_lossy().into_owned();
        let status = std::fs::read_to_string(entry.path().join("status")).unwrap_or_default();
        let name = status_field(&status, "Name:").unwrap_or("?");
        let state = status_field(&status, "State:").unwrap_or("?");
        let _ = writeln!(details, "Thread {tid}: name={name}, state={state}");
    }
    (count.max(1), details)
}

#[cfg(target_os = "linux")]
fn status_field<'a>(status: &'a str, field: &str) -> Option<&'a str> {
    status
        .lines()
        .find(|line| line.starts_with(field))
        .map(|line| line[field.len()..].trim())
}

#[cfg(target_os = "macos")]
fn enumerate_threads() -> (u32, String) {
    let mut info: libc::proc_taskinfo = unsafe { std::mem::zeroed() };
    let size = std::mem::size_of::<libc::proc_taskinfo>() as libc::c_int;
    // SAFETY: info is valid for size bytes; the call only writes into it.
    let rc = unsafe {
        libc::proc_pidinfo(
            std::process::id() as libc::c_int,
            libc::PROC_PIDTASKINFO,
            0,
            &mut info as *mut libc::proc_taskinfo as *mut libc::c_void,
            size,
        )
    };
    if rc == size {
        let count = (info.pti_threadnum as u32).max(1);
        let mut details = String::new();
        let _ = writeln!(details, "Threads: {count}");
        let _ = writeln!(details, "Per-thread diagnostics are not collected on this platform");
        (count, details)
    } else {
        (1, "Unable to enumerate threads".to_string())
    }
}
