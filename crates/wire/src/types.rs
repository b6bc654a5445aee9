// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation-specific request and response bodies.

use pba_core::Task;
use serde::{Deserialize, Serialize};

/// POST /agent/heartbeat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub version: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null", default)]
    pub capabilities: serde_json::Value,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub os_info: String,
}

/// POST /agent/heartbeat response data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeartbeatAck {
    #[serde(default)]
    pub server_time: String,
    #[serde(default)]
    pub next_heartbeat_in: i64,
}

/// GET /agent/tasks response data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPage {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub count: usize,
}

/// POST /agent/tasks/{id}/progress request.
///
/// The optional counters are filled when the sample came from the
/// archiver's progress stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressReport {
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub files_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub original_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub compressed_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub deduplicated_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_path: Option<String>,
}

impl ProgressReport {
    pub fn percent(progress: u8, message: impl Into<String>) -> Self {
        Self {
            progress,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// POST /agent/tasks/{id}/complete request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub exit_code: i32,
    pub result: serde_json::Map<String, serde_json::Value>,
}

/// POST /agent/tasks/{id}/fail request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailRequest {
    pub error: String,
    pub exit_code: i32,
}

/// GET /agent/tasks/{id}/status response data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub should_cancel: bool,
}

/// POST /agent/update/check response data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCheck {
    #[serde(default)]
    pub update_available: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
}

/// POST /agent/certificate/renew response data: a freshly issued bundle,
/// each part base64-encoded PEM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateIssue {
    pub cert: String,
    pub key: String,
    pub ca: String,
    #[serde(default)]
    pub expires_at: String,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
