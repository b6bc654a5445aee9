// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The response envelope every control-plane endpoint shares.

use serde::{Deserialize, Serialize};

/// Standard response wrapper: `{success, message, data, error}`.
///
/// `data` stays opaque here; callers decode it into the operation-specific
/// type once the envelope reports success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

/// Error detail carried by a `success=false` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default)]
    pub code: String,
}

impl Envelope {
    /// The server-reported error message, or a placeholder when the
    /// envelope carries none.
    pub fn error_message(&self) -> &str {
        self.error
            .as_ref()
            .map(|e| e.message.as_str())
            .unwrap_or("unknown error")
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
