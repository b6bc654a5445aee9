// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot technology detection: LVM, ZFS, Btrfs.

use serde_json::{json, Value};

use crate::cmd::{self, PROBE_TIMEOUT};

pub(crate) async fn detect_snapshots() -> Vec<Value> {
    let mut providers = Vec::new();

    if cmd::on_path("lvcreate").await {
        let lvs = cmd::run_sudo(
            "lvs",
            &["--noheadings", "-o", "lv_name,vg_name,lv_path"],
            PROBE_TIMEOUT,
        )
        .await;
        if lvs.success() {
            let volumes = count_nonempty_lines(&lvs.stdout);
            if volumes > 0 {
                providers.push(json!({
                    "type": "lvm",
                    "name": "LVM Snapshot",
                    "available": true,
                    "description": "Logical Volume Manager snapshots for consistent backups",
                    "details": format!("{} volume(s) available", volumes),
                }));
            }
        }
    }

    if cmd::on_path("zfs").await {
        let datasets = cmd::run("zfs", &["list", "-H", "-o", "name"], PROBE_TIMEOUT).await;
        if datasets.success() {
            let count = count_nonempty_lines(&datasets.stdout);
            if count > 0 {
                providers.push(json!({
                    "type": "zfs",
                    "name": "ZFS Snapshot",
                    "available": true,
                    "description": "ZFS dataset snapshots with instant creation",
                    "details": format!("{} dataset(s) available", count),
                }));
            }
        }
    }

    if cmd::on_path("btrfs").await {
        let subvolumes =
            cmd::sh_sudo("btrfs subvolume list / 2>/dev/null", PROBE_TIMEOUT).await;
        if subvolumes.success() {
            providers.push(json!({
                "type": "btrfs",
                "name": "Btrfs Snapshot",
                "available": true,
                "description": "Btrfs subvolume snapshots with CoW efficiency",
                "details": "Btrfs filesystem detected",
            }));
        }
    }

    providers
}

pub(crate) fn count_nonempty_lines(output: &str) -> usize {
    output.lines().filter(|l| !l.trim().is_empty()).count()
}

#[cfg(test)]
#[path = "snapshots_tests.rs"]
mod tests;
