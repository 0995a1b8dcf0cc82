// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

const UNKNOWN: &str = "Unknown";

/// Application facts reported with every crash. Set once at configure time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    pub name: String,
    pub version: String,
    pub executable_path: String,
}

impl ApplicationInfo {
    pub fn new(name: &str, version: &str, executable_path: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            executable_path: executable_path
                .or_else(default_executable_path)
                .unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

impl Default for ApplicationInfo {
    fn default() -> Self {
        let executable_path = default_executable_path();
        let name = executable_path
            .as_deref()
            .and_then(|path| std::path::Path::new(path).file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| UNKNOWN.to_string());
        Self {
            name,
            version: UNKNOWN.to_string(),
            executable_path: executable_path.unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

fn default_executable_path() -> Option<String> {
    std::env::current_exe()
        .ok()
        .map(|path| path.display().to_string())
        .or_else(|| std::env::args().next())
}
