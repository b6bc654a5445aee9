// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pba-probe: Read-only host capability detection and stats collection.
//!
//! Every probe is best-effort: a failing command yields an absent field,
//! never an aborted report. Per-command deadlines are 60 seconds or less,
//! so total probe time stays bounded.

mod cmd;
mod databases;
mod docker;
mod filesystem;
mod osinfo;
mod snapshots;
mod stats;

pub use osinfo::os_info;
pub use stats::collect_stats;

/// Build the full capability report: snapshot providers, database engines,
/// container runtime and the mount table.
pub async fn detect_capabilities() -> serde_json::Map<String, serde_json::Value> {
    let mut report = serde_json::Map::new();
    report.insert(
        "snapshots".to_string(),
        serde_json::Value::Array(snapshots::detect_snapshots().await),
    );
    report.insert(
        "databases".to_string(),
        serde_json::Value::Array(databases::detect_databases().await),
    );
    report.insert("docker".to_string(), docker::detect_docker().await);
    report.insert("filesystem".to_string(), filesystem::detect_filesystem().await);
    report
}
