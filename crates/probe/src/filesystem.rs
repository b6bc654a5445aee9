// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mount table snapshot.

use serde_json::{json, Value};

use crate::cmd::{self, PROBE_TIMEOUT};

pub(crate) async fn detect_filesystem() -> Value {
    let mut filesystem = json!({ "mounts": [] });

    let df = cmd::run("df", &["-h"], PROBE_TIMEOUT).await;
    if df.success() {
        filesystem["mounts"] = Value::Array(parse_df_mounts(&df.stdout));
    }

    filesystem
}

/// Parse `df -h` output, skipping the header line.
pub(crate) fn parse_df_mounts(output: &str) -> Vec<Value> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 {
                return None;
            }
            Some(json!({
                "filesystem": fields[0],
                "size": fields[1],
                "used": fields[2],
                "available": fields[3],
                "use_percent": fields[4],
                "mount": fields[5],
            }))
        })
        .collect()
}

#[cfg(test)]
#[path = "filesystem_tests.rs"]
mod tests;
