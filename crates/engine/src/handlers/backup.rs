// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Archive creation and restore handlers.
//!
//! Archiver exit-code policy for create: 0 is success, 1 is success with
//! warnings (unreadable files were skipped), 2 and above is failure. Any
//! nonzero exit fails a restore.

use std::sync::Arc;

use pba_adapters::borg::{CreateArchive, ExtractArchive};
use pba_adapters::subprocess;
use pba_core::{config, format_elapsed, ArchiveProgress, Clock, Task};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{parse_payload, subprocess_failure, Outcome, TaskCtx};
use crate::error::TaskError;
use crate::progress::ProgressSink;

#[derive(Debug, Deserialize)]
struct CreateParams {
    repo_path: String,
    archive_name: String,
    paths: Vec<String>,
    #[serde(default)]
    excludes: Vec<String>,
    #[serde(default)]
    compression: Option<String>,
    #[serde(default)]
    passphrase: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestoreParams {
    repo_path: String,
    archive_name: String,
    #[serde(default)]
    dest_path: Option<String>,
    #[serde(default)]
    patterns: Vec<String>,
}

pub(crate) async fn create<C: Clock>(
    ctx: &TaskCtx<C>,
    task: &Task,
    cancel: &CancellationToken,
) -> Result<Outcome, TaskError> {
    let params: CreateParams = parse_payload(task)?;
    if params.repo_path.is_empty() || params.archive_name.is_empty() {
        return Err(TaskError::Payload(
            "repo_path and archive_name must not be empty".to_string(),
        ));
    }
    if params.paths.is_empty() {
        return Err(TaskError::Payload("paths must not be empty".to_string()));
    }

    ctx.sink.update(5, "Starting backup...").await;

    let spec = CreateArchive {
        repo_path: params.repo_path,
        archive_name: params.archive_name,
        paths: params.paths,
        excludes: params.excludes,
        compression: params.compression,
        passphrase: params.passphrase,
    }
    .spec(&ctx.config.borg_ssh);

    // Samples come off the subprocess reading path synchronously; the pump
    // applies the throttle and posts without stalling the stream.
    let (sample_tx, sample_rx) = mpsc::unbounded_channel();
    let pump = spawn_progress_pump(ctx.sink.clone(), sample_rx);

    let result = subprocess::run_streaming(spec, cancel, &mut |sample| {
        let _ = sample_tx.send(sample);
    })
    .await;

    drop(sample_tx);
    let _ = pump.await;

    if result.error.is_some() || result.exit_code > 1 {
        return Err(subprocess_failure("borg create failed", &result));
    }

    let has_warnings = result.exit_code == 1;
    if has_warnings {
        ctx.sink
            .update(95, "Backup completed with warnings (some files skipped)")
            .await;
    } else {
        ctx.sink.update(95, "Backup completed successfully").await;
    }

    let mut output = serde_json::Map::new();
    output.insert("stdout".to_string(), json!(result.stdout));
    output.insert("stderr".to_string(), json!(result.stderr));
    output.insert("duration".to_string(), json!(format_elapsed(result.duration)));
    output.insert("has_warnings".to_string(), json!(has_warnings));
    output.insert("exit_code".to_string(), json!(result.exit_code));
    Ok(Outcome::ok(output))
}

pub(crate) async fn restore<C: Clock>(
    ctx: &TaskCtx<C>,
    task: &Task,
    cancel: &CancellationToken,
) -> Result<Outcome, TaskError> {
    let params: RestoreParams = parse_payload(task)?;
    if params.repo_path.is_empty() || params.archive_name.is_empty() {
        return Err(TaskError::Payload(
            "repo_path and archive_name must not be empty".to_string(),
        ));
    }

    let dest_path = params
        .dest_path
        .filter(|p| !p.is_empty())
        .map(std::path::PathBuf::from)
        .unwrap_or_else(config::default_restore_dir);

    ctx.sink.update(10, "Starting restore...").await;

    if let Err(error) = tokio::fs::create_dir_all(&dest_path).await {
        tracing::warn!(dest = %dest_path.display(), %error, "could not create restore destination");
    }

    let spec = ExtractArchive {
        repo_path: params.repo_path,
        archive_name: params.archive_name,
        dest_path: dest_path.clone(),
        patterns: params.patterns,
    }
    .spec(&ctx.config.borg_ssh);

    let result = subprocess::run(spec, cancel).await;
    if result.error.is_some() || result.exit_code != 0 {
        return Err(subprocess_failure("borg extract failed", &result));
    }

    ctx.sink.update(90, "Restore completed").await;

    let mut output = serde_json::Map::new();
    output.insert("stdout".to_string(), json!(result.stdout));
    output.insert("stderr".to_string(), json!(result.stderr));
    output.insert("duration".to_string(), json!(format_elapsed(result.duration)));
    output.insert(
        "dest_path".to_string(),
        json!(dest_path.display().to_string()),
    );
    Ok(Outcome::ok(output))
}

/// Drain archiver samples, posting at most one per second. Dropped
/// intermediates are remembered so the last sample always surfaces once
/// the stream closes.
fn spawn_progress_pump<C: Clock>(
    sink: Arc<ProgressSink<C>>,
    mut samples: mpsc::UnboundedReceiver<ArchiveProgress>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut pending: Option<ArchiveProgress> = None;
        while let Some(sample) = samples.recv().await {
            if sink.allow() {
                sink.post_archive(&sample).await;
                pending = None;
            } else {
                pending = Some(sample);
            }
        }
        if let Some(sample) = pending {
            sink.post_archive(&sample).await;
        }
    })
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
