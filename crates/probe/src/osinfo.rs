// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operating system identification.

use crate::cmd::{self, UNIT_TIMEOUT};

/// A one-line OS description: `lsb_release -ds`, then the os-release
/// PRETTY_NAME, then `uname -a`, then "Unknown".
pub async fn os_info() -> String {
    let lsb = cmd::run("lsb_release", &["-ds"], UNIT_TIMEOUT).await;
    if lsb.success() && !lsb.stdout.trim().is_empty() {
        return lsb.stdout.trim().to_string();
    }

    if let Ok(contents) = tokio::fs::read_to_string("/etc/os-release").await {
        if let Some(name) = pretty_name(&contents) {
            return name;
        }
    }

    let uname = cmd::run("uname", &["-a"], UNIT_TIMEOUT).await;
    if uname.success() && !uname.stdout.trim().is_empty() {
        return uname.stdout.trim().to_string();
    }

    "Unknown".to_string()
}

pub(crate) fn pretty_name(os_release: &str) -> Option<String> {
    os_release
        .lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|name| name.trim_matches('"').to_string())
}

#[cfg(test)]
#[path = "osinfo_tests.rs"]
mod tests;
