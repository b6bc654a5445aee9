// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Self-update: download, verify, swap the running binary in place, then
//! hand the restart to the service manager.
//!
//! The sequence is ordered so that a failure at any step leaves the
//! currently executing binary at its path: verification happens on a
//! staged copy in the world-temp directory, and the in-place swap renames
//! the live binary aside before copying the new one in, undone if that
//! copy fails.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pba_adapters::subprocess::{self, ExecSpec};
use pba_core::{config, Clock, Task};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use super::{parse_payload, Outcome, TaskCtx};
use crate::error::TaskError;

const STAGED_NAME: &str = ".phpborg-agent.new";
const BACKUP_NAME: &str = ".phpborg-agent.backup";
const VERIFY_TIMEOUT: Duration = Duration::from_secs(30);
const RESTART_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct UpdateParams {
    #[serde(default)]
    checksum: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    force: bool,
}

pub(crate) async fn run<C: Clock>(
    ctx: &TaskCtx<C>,
    task: &Task,
    cancel: &CancellationToken,
) -> Result<Outcome, TaskError> {
    let params: UpdateParams = parse_payload(task)?;
    let expected_checksum = params.checksum.filter(|c| !c.is_empty());
    if expected_checksum.is_none() && !params.force {
        return Err(TaskError::Payload(
            "checksum required for update (or set force=true)".to_string(),
        ));
    }

    ctx.sink.update(10, "Preparing update...").await;

    // Resolve the running executable through any symlinks.
    let current = std::env::current_exe()
        .map_err(|e| TaskError::Update(format!("failed to locate current executable: {}", e)))?;
    let current = tokio::fs::canonicalize(&current)
        .await
        .map_err(|e| TaskError::Update(format!("failed to resolve executable path: {}", e)))?;

    // Stage into world-temp: the installation prefix may be shielded by
    // the service manager, /tmp is not.
    let temp_dir = config::default_temp_dir();
    let staged = temp_dir.join(STAGED_NAME);

    ctx.sink.update(20, "Downloading new binary...").await;
    if let Err(error) = ctx.client.download_update(&staged).await {
        remove_quiet(&staged).await;
        return Err(TaskError::Update(format!(
            "failed to download update: {}",
            error
        )));
    }

    ctx.sink.update(60, "Verifying checksum...").await;
    if let Some(expected) = &expected_checksum {
        let actual = match file_sha256(&staged).await {
            Ok(digest) => digest,
            Err(error) => {
                remove_quiet(&staged).await;
                return Err(TaskError::Update(format!(
                    "failed to checksum download: {}",
                    error
                )));
            }
        };
        if actual != *expected {
            remove_quiet(&staged).await;
            return Err(TaskError::Update(format!(
                "checksum mismatch: expected {}, got {}",
                expected, actual
            )));
        }
    }

    ctx.sink.update(70, "Making binary executable...").await;
    if let Err(error) = set_executable(&staged).await {
        remove_quiet(&staged).await;
        return Err(TaskError::Update(format!(
            "failed to set executable permission: {}",
            error
        )));
    }

    ctx.sink.update(75, "Verifying new binary...").await;
    let probe = subprocess::run(
        ExecSpec::new(staged.display().to_string(), VERIFY_TIMEOUT).arg("--version"),
        cancel,
    )
    .await;
    if !probe.success() {
        remove_quiet(&staged).await;
        return Err(TaskError::Update(format!(
            "new binary verification failed (exit {}): {}",
            probe.exit_code,
            probe.stderr.trim()
        )));
    }

    ctx.sink.update(80, "Backing up current binary...").await;
    let backup = temp_dir.join(BACKUP_NAME);
    if let Err(error) = tokio::fs::copy(&current, &backup).await {
        remove_quiet(&staged).await;
        return Err(TaskError::Update(format!(
            "failed to back up current binary: {}",
            error
        )));
    }

    ctx.sink.update(85, "Replacing binary...").await;

    // Renaming the live binary is permitted while it executes; writing
    // over it is not.
    let old = PathBuf::from(format!("{}.old", current.display()));
    remove_quiet(&old).await;
    if let Err(error) = tokio::fs::rename(&current, &old).await {
        remove_quiet(&staged).await;
        return Err(TaskError::Update(format!(
            "failed to rename current binary: {}",
            error
        )));
    }

    if let Err(error) = tokio::fs::copy(&staged, &current).await {
        // Put the old binary back so the agent stays updatable.
        let _ = tokio::fs::rename(&old, &current).await;
        remove_quiet(&staged).await;
        return Err(TaskError::Update(format!(
            "failed to install new binary: {}",
            error
        )));
    }

    if let Err(error) = set_executable(&current).await {
        tracing::warn!(%error, "failed to set permissions on installed binary");
    }

    remove_quiet(&staged).await;
    remove_quiet(&old).await;

    ctx.sink
        .update(90, "Restarting agent via service manager...")
        .await;

    // Detached and delayed so this task can still deliver its terminal
    // state before the service manager takes the process down.
    schedule_restart();

    remove_quiet(&backup).await;

    let mut result = serde_json::Map::new();
    result.insert(
        "previous_version".to_string(),
        json!(ctx.config.agent.version),
    );
    result.insert("new_version".to_string(), json!(params.version));
    result.insert(
        "binary_path".to_string(),
        json!(current.display().to_string()),
    );
    result.insert("status".to_string(), json!("updated"));
    result.insert(
        "message".to_string(),
        json!("Agent updated successfully, restarting..."),
    );
    Ok(Outcome::ok(result))
}

/// SHA-256 hex digest of a file.
pub(crate) async fn file_sha256(path: &Path) -> std::io::Result<String> {
    let contents = tokio::fs::read(path).await?;
    let digest = Sha256::digest(&contents);
    Ok(hex::encode(digest))
}

async fn set_executable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

async fn remove_quiet(path: &Path) {
    let _ = tokio::fs::remove_file(path).await;
}

fn schedule_restart() {
    tokio::spawn(async {
        tokio::time::sleep(RESTART_DELAY).await;

        #[cfg(unix)]
        {
            let status = tokio::process::Command::new("systemctl")
                .args(["restart", "phpborg-agent"])
                .status()
                .await;
            if !matches!(status, Ok(s) if s.success()) {
                // Fall back on the unit's restart-on-exit policy.
                tracing::error!("service restart failed, interrupting self");
                unsafe {
                    libc::raise(libc::SIGINT);
                }
            }
        }

        #[cfg(windows)]
        {
            let _ = tokio::process::Command::new("cmd")
                .args(["/C", "sc stop phpborg-agent && sc start phpborg-agent"])
                .status()
                .await;
        }
    });
}

#[cfg(test)]
#[path = "update_tests.rs"]
mod tests;
