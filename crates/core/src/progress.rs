// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress samples parsed from the archiver's diagnostic stream.

use serde::{Deserialize, Serialize};

/// One `archive_progress` event from the archiver's `--log-json` stderr.
///
/// The four counters are monotonic non-decreasing within a single run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveProgress {
    #[serde(default)]
    pub nfiles: i64,
    #[serde(default)]
    pub original_size: i64,
    #[serde(default)]
    pub compressed_size: i64,
    #[serde(default)]
    pub deduplicated_size: i64,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub finished: bool,
}
