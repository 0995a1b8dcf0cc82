// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Recovery-phase collector for host facts. Never fails: anything that cannot
//! be determined degrades to a human-readable placeholder.

use crate::shared::configuration::DetailLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub cpu_architecture: String,
    pub os_name: String,
    pub os_version: String,
    pub kernel_version: String,
    /// Free-form facts: CPU model, core count, physical memory, and at the
    /// extended detail level, process-level entries.
    pub additional_info: BTreeMap<String, String>,
}

impl SystemInfo {
    pub fn collect(detail_level: DetailLevel) -> Self {
        let uts = nix::sys::utsname::uname().ok();
        let cpu_architecture = uts
            .as_ref()
            .map(|u| u.machine().to_string_lossy().into_owned())
            .unwrap_or_else(|| UNKNOWN.to_string());
        let kernel_version = uts
            .as_ref()
            .map(|u| u.release().to_string_lossy().into_owned())
            .unwrap_or_else(|| UNKNOWN.to_string());
        let (os_name, os_version) = os_name_and_version();

        let mut additional_info = BTreeMap::new();
        if detail_level != DetailLevel::Minimal {
            collect_hardware_facts(&mut additional_info);
        }
        if detail_level == DetailLevel::Extended {
            collect_process_facts(&mut additional_info);
        }

        Self {
            cpu_architecture,
            os_name,
            os_version,
            kernel_version,
            additional_info,
        }
    }
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            cpu_architecture: UNKNOWN.to_string(),
            os_name: UNKNOWN.to_string(),
            os_version: UNKNOWN.to_string(),
            kernel_version: UNKNOWN.to_string(),
            additional_info: BTreeMap::new(),
        }
    }
}

fn format_memory_gb(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
}

#[cfg(target_os = "linux")]
fn os_name_and_version() -> (String, String) {
    parse_os_release(&std::fs::read_to_string("/etc/os-release").unwrap_or_default())
        .unwrap_or_else(|| {
            let info = os_info::get();
            (info.os_type().to_string(), info.version().to_string())
        })
}

/// `NAME=` and `VERSION_ID=` from os-release content, surrounding quotes
/// stripped.
#[cfg(target_os = "linux")]
fn parse_os_release(contents: &str) -> Option<(String, String)> {
    let mut name = None;
    let mut version = None;
    for line in contents.lines() {
        if let Some(value) = line.strip_prefix("NAME=") {
            name = Some(strip_quotes(value).to_string());
        } else if let Some(value) = line.strip_prefix("VERSION_ID=") {
            version = Some(strip_quotes(value).to_string());
        }
    }
    Some((name?, version.unwrap_or_else(|| UNKNOWN.to_string())))
}

#[cfg(target_os = "linux")]
fn strip_quotes(value: &str) -> &str {
    value.trim().trim_matches('"')
}

#[cfg(target_os = "linux")]
fn collect_hardware_facts(additional_info: &mut BTreeMap<String, String>) {
    let cpuinfo = std::fs::read_to_string("/proc/cpuinfo").unwrap_or_default();
    let model = cpuinfo
        .lines()
        .find(|line| line.starts_with("model name"))
        .and_then(|line| line.split_once(':'))
        .map(|(_, value)| value.trim().to_string());
    if let Some(model) = model {
        additional_info.insert("CPU Model".to_string(), model);
    }

    let cores = cpuinfo
        .lines()
        .filter(|line| line.starts_with("processor"))
        .count();
    let cores = if cores > 0 {
        cores
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    };
    additional_info.insert("CPU Cores".to_string(), cores.to_string());

    let memory_kb = std::fs::read_to_string("/proc/meminfo")
        .unwrap_or_default()
        .lines()
        .find(|line| line.starts_with("MemTotal:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|value| value.parse::<u64>().ok());
    if let Some(memory_kb) = memory_kb {
        additional_info.insert(
            "Physical Memory".to_string(),
            format_memory_gb(memory_kb * 1024),
        );
    }
}

#[cfg(target_os = "linux")]
fn collect_process_facts(additional_info: &mut BTreeMap<String, String>) {
    additional_info.insert("PID".to_string(), std::process::id().to_string());
    let status = std::fs::read_to_string("/proc/self/status").unwrap_or_default();
    for (field, label) in [("VmRSS:", "Process Resident Size"), ("VmSize:", "Process Virtual Size")]
    {
        if let Some(value) = status
            .lines()
            .find(|line| line.starts_with(field))
            .map(|line| line[field.len()..].trim().to_string())
        {
            additional_info.insert(label.to_string(), value);
        }
    }
}

#[cfg(target_os = "macos")]
fn os_name_and_version() -> (String, String) {
    ("macOS".to_string(), os_info::get().version().to_string())
}

#[cfg(target_os = "macos")]
fn collect_hardware_facts(additional_info: &mut BTreeMap<String, String>) {
    if let Some(model) = sysctl_string("hw.model\0") {
        additional_info.insert("CPU Model".to_string(), model);
    }
    let cores = sysctl_u32("hw.logicalcpu\0")
        .map(|n| n as usize)
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
    additional_info.insert("CPU Cores".to_string(), cores.to_string());
    if let Some(memory) = sysctl_u64("hw.memsize\0") {
        additional_info.insert("Physical Memory".to_string(), format_memory_gb(memory));
    }
}

#[cfg(target_os = "macos")]
fn collect_process_facts(additional_info: &mut BTreeMap<String, String>) {
    additional_info.insert("PID".to_string(), std::process::id().to_string());
}

#[cfg(target_os = "macos")]
fn sysctl_string(name: &str) -> Option<String> {
    let mut len: libc::size_t = 0;
    // SAFETY: name is NUL-terminated; the first call only queries the length.
    let rc = unsafe {
        libc::sysctlbyname(
            name.as_ptr() as *const libc::c_char,
            std::ptr::null_mut(),
            &mut len,
            std::ptr::null_mut(),
            0,
        )
    };
    if rc != 0 || len == 0 {
        return None;
    }
    let mut buf = vec![0u8; len];
    // SAFETY: buf is valid for len bytes.
    let rc = unsafe {
        libc::sysctlbyname(
            name.as_ptr() as *const libc::c_char,
            buf.as_mut_ptr() as *mut libc::c_void,
            &mut len,
            std::ptr::null_mut(),
            0,
        )
    };
    if rc != 0 {
        return None;
    }
    buf.truncate(len.saturating_sub(1));
    String::from_utf8(buf).ok()
}

#[cfg(target_os = "macos")]
fn sysctl_u32(name: &str) -> Option<u32> {
    let mut value: u32 = 0;
    let mut len = std::mem::size_of::<u32>() as libc::size_t;
    // SAFETY: value is valid for len bytes.
    let rc = unsafe {
        libc::sysctlbyname(
            name.as_ptr() as *const libc::c_char,
            &mut value as *mut u32 as *mut libc::c_void,
            &mut len,
            std::ptr::null_mut(),
            0,
        )
    };
    (rc == 0).then_some(value)
}

#[cfg(target_os = "macos")]
fn sysctl_u64(name: &str) -> Option<u64> {
    let mut value: u64 = 0;
    let mut len = std::mem::size_of::<u64>() as libc::size_t;
    // SAFETY: value is valid for len bytes.
    let rc = unsafe {
        libc::sysctlbyname(
            name.as_ptr() as *const libc::c_char,
            &mut value as *mut u64 as *mut libc::c_void,
            &mut len,
            std::ptr::null_mut(),
            0,
        )
    };
    (rc == 0).then_some(value)
}
