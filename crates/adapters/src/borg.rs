// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Archiver invocation: argument and environment assembly for borg runs.

use std::path::PathBuf;
use std::time::Duration;

use pba_core::config::BorgSshConfig;

use crate::subprocess::ExecSpec;

/// Deadline for archive creation and extraction.
pub const ARCHIVE_TIMEOUT: Duration = Duration::from_secs(4 * 3600);

/// Archiver binary name. `PHPBORG_AGENT_BORG_BIN` overrides it for test
/// harnesses and non-standard installs.
pub fn borg_program() -> String {
    std::env::var("PHPBORG_AGENT_BORG_BIN").unwrap_or_else(|_| "borg".to_string())
}

/// Environment entries every archiver run needs: the remote shell command
/// (SSH port and key baked in) and the remote repository URL.
///
/// Host-key checking is disabled to match the provisioning flow; pinning
/// the server host key in the config is the intended follow-up.
pub fn remote_env(ssh: &BorgSshConfig) -> Vec<(String, String)> {
    let rsh = format!(
        "ssh -p {} -i {} -o StrictHostKeyChecking=no",
        ssh.port, ssh.private_key_path
    );
    let repo = format!("{}@{}:{}", ssh.user, ssh.host, ssh.backup_path);
    vec![
        ("BORG_RSH".to_string(), rsh),
        ("BORG_REPO".to_string(), repo),
    ]
}

/// `borg create` invocation.
#[derive(Debug, Clone)]
pub struct CreateArchive {
    pub repo_path: String,
    pub archive_name: String,
    pub paths: Vec<String>,
    pub excludes: Vec<String>,
    pub compression: Option<String>,
    pub passphrase: Option<String>,
}

impl CreateArchive {
    pub fn spec(&self, ssh: &BorgSshConfig) -> ExecSpec {
        let mut spec = ExecSpec::new(borg_program(), ARCHIVE_TIMEOUT)
            .args(["create", "--verbose", "--stats", "--progress", "--log-json"]);

        if let Some(compression) = &self.compression {
            spec = spec.arg("--compression").arg(compression);
        }
        for exclude in &self.excludes {
            if !exclude.is_empty() {
                spec = spec.arg("--exclude").arg(exclude);
            }
        }

        spec = spec
            .arg(format!("{}::{}", self.repo_path, self.archive_name))
            .args(self.paths.iter().cloned());

        for (key, value) in remote_env(ssh) {
            spec = spec.env(key, value);
        }
        // Passphrase travels in the environment, never on the command line.
        if let Some(passphrase) = &self.passphrase {
            spec = spec.env("BORG_PASSPHRASE", passphrase);
        }

        spec
    }
}

/// `borg extract` invocation, run from inside the destination directory.
#[derive(Debug, Clone)]
pub struct ExtractArchive {
    pub repo_path: String,
    pub archive_name: String,
    pub dest_path: PathBuf,
    pub patterns: Vec<String>,
}

impl ExtractArchive {
    pub fn spec(&self, ssh: &BorgSshConfig) -> ExecSpec {
        let mut spec = ExecSpec::new(borg_program(), ARCHIVE_TIMEOUT)
            .args(["extract", "--verbose", "--progress"])
            .arg(format!("{}::{}", self.repo_path, self.archive_name))
            .args(self.patterns.iter().cloned())
            .cwd(self.dest_path.clone());

        for (key, value) in remote_env(ssh) {
            spec = spec.env(key, value);
        }

        spec
    }
}

#[cfg(test)]
#[path = "borg_tests.rs"]
mod tests;
