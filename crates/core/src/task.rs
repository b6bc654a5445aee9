// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task model: units of work delivered by the control plane.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default task deadline when the payload carries `timeout_seconds: 0`.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(3600);

/// The closed set of task types the agent executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    BackupCreate,
    BackupRestore,
    CapabilitiesDetect,
    StatsCollect,
    AgentUpdate,
    Test,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::BackupCreate => "backup_create",
            TaskKind::BackupRestore => "backup_restore",
            TaskKind::CapabilitiesDetect => "capabilities_detect",
            TaskKind::StatsCollect => "stats_collect",
            TaskKind::AgentUpdate => "agent_update",
            TaskKind::Test => "test",
        };
        write!(f, "{}", name)
    }
}

/// A unit of work observed from a poll response.
///
/// The payload schema depends on the task type; handlers parse it into
/// typed records and reject missing required fields before running any
/// subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Control-plane-unique identifier.
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    /// Informational priority label.
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub created_at: String,
}

impl Task {
    /// The task deadline: the declared timeout, or 1 hour when unset.
    pub fn timeout(&self) -> Duration {
        if self.timeout_seconds == 0 {
            DEFAULT_TASK_TIMEOUT
        } else {
            Duration::from_secs(self.timeout_seconds)
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
