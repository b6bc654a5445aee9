// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Synthetic `test` task for end-to-end harness runs.

use std::time::Duration;

use pba_core::{Clock, Task};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{parse_payload, Outcome, TaskCtx};
use crate::error::TaskError;

#[derive(Debug, Deserialize)]
struct TestParams {
    #[serde(default)]
    message: Option<String>,
}

/// Emit progress 0 → 100 in steps of 20, half a second apart. Reports go
/// out directly: the point of this task is to exercise the reporting
/// path, not the throttle.
pub(crate) async fn run<C: Clock>(
    ctx: &TaskCtx<C>,
    task: &Task,
    cancel: &CancellationToken,
) -> Result<Outcome, TaskError> {
    let params: TestParams = parse_payload(task)?;
    let message = params
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "Test task executed successfully".to_string());

    for step in (0u8..=100).step_by(20) {
        if cancel.is_cancelled() {
            return Err(TaskError::Cancelled);
        }
        ctx.sink
            .update(step, format!("Test progress: {}%", step))
            .await;
        tokio::select! {
            () = cancel.cancelled() => return Err(TaskError::Cancelled),
            () = tokio::time::sleep(Duration::from_millis(500)) => {}
        }
    }

    let mut result = serde_json::Map::new();
    result.insert("message".to_string(), json!(message));
    result.insert("time".to_string(), json!(chrono::Utc::now().to_rfc3339()));
    Ok(Outcome::ok(result))
}
