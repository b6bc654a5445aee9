// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task handlers: typed payload extraction, execution, result shaping.

mod backup;
mod test_task;
mod update;

use std::sync::Arc;

use pba_adapters::{ApiClient, ExecError, ExecResult};
use pba_core::{Clock, Config, Task, TaskKind};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::progress::ProgressSink;

/// Everything a handler needs for one task.
pub(crate) struct TaskCtx<C: Clock> {
    pub(crate) client: Arc<ApiClient>,
    pub(crate) config: Arc<Config>,
    pub(crate) sink: Arc<ProgressSink<C>>,
}

/// A successful handler run: the result map and the exit code reported
/// with the `complete` terminal state.
#[derive(Debug)]
pub(crate) struct Outcome {
    pub(crate) result: serde_json::Map<String, serde_json::Value>,
    pub(crate) exit_code: i32,
}

impl Outcome {
    pub(crate) fn ok(result: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            result,
            exit_code: 0,
        }
    }
}

/// Dispatch on the task's type tag.
pub(crate) async fn dispatch<C: Clock>(
    ctx: &TaskCtx<C>,
    task: &Task,
    cancel: &CancellationToken,
) -> Result<Outcome, TaskError> {
    match task.kind {
        TaskKind::BackupCreate => backup::create(ctx, task, cancel).await,
        TaskKind::BackupRestore => backup::restore(ctx, task, cancel).await,
        TaskKind::CapabilitiesDetect => capabilities_detect(ctx).await,
        TaskKind::StatsCollect => stats_collect(ctx).await,
        TaskKind::AgentUpdate => update::run(ctx, task, cancel).await,
        TaskKind::Test => test_task::run(ctx, task, cancel).await,
    }
}

/// Parse the untyped payload into a handler's typed record. A missing
/// required field fails here, before any subprocess runs.
pub(crate) fn parse_payload<T: DeserializeOwned>(task: &Task) -> Result<T, TaskError> {
    serde_json::from_value(serde_json::Value::Object(task.payload.clone()))
        .map_err(|error| TaskError::Payload(error.to_string()))
}

/// Map a finished subprocess run to a task error.
pub(crate) fn subprocess_failure(context: &'static str, result: &ExecResult) -> TaskError {
    if matches!(result.error, Some(ExecError::Cancelled { .. })) {
        return TaskError::Cancelled;
    }
    let message = match &result.error {
        Some(error) => error.to_string(),
        None => result.stderr.trim().to_string(),
    };
    TaskError::Archiver {
        context,
        message,
        exit_code: result.exit_code,
    }
}

async fn capabilities_detect<C: Clock>(ctx: &TaskCtx<C>) -> Result<Outcome, TaskError> {
    ctx.sink.update(50, "Detecting capabilities...").await;

    let capabilities = pba_probe::detect_capabilities().await;
    let os_info = pba_probe::os_info().await;

    let mut result = serde_json::Map::new();
    result.insert(
        "capabilities".to_string(),
        serde_json::Value::Object(capabilities),
    );
    result.insert("os_info".to_string(), serde_json::Value::String(os_info));
    Ok(Outcome::ok(result))
}

async fn stats_collect<C: Clock>(ctx: &TaskCtx<C>) -> Result<Outcome, TaskError> {
    ctx.sink.update(10, "Collecting system information...").await;
    let stats = pba_probe::collect_stats().await;
    ctx.sink.update(100, "Stats collection completed").await;

    tracing::info!(metrics = stats.len(), "stats collection completed");
    Ok(Outcome::ok(stats))
}
