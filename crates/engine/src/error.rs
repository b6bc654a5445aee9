// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task-level failures and their exit-code mapping.

use thiserror::Error;

/// Why a task ended in a `fail` terminal state.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The payload failed typed validation. Raised before any subprocess
    /// runs.
    #[error("invalid payload: {0}")]
    Payload(String),
    /// The archiver (or another probed command) failed. Carries the child
    /// exit code, or −1 for engine-level failures.
    #[error("{context}: {message}")]
    Archiver {
        context: &'static str,
        message: String,
        exit_code: i32,
    },
    #[error("task cancelled")]
    Cancelled,
    #[error("task timed out")]
    Timeout,
    #[error("update failed: {0}")]
    Update(String),
}

impl TaskError {
    /// Exit code reported alongside the `fail` terminal state. Timeouts
    /// surface as −1, like other engine-level failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            TaskError::Archiver { exit_code, .. } => *exit_code,
            TaskError::Timeout => -1,
            TaskError::Payload(_) | TaskError::Cancelled | TaskError::Update(_) => 1,
        }
    }
}
