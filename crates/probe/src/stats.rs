// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flat host-metric collection for `stats_collect` tasks.

use serde_json::{json, Map, Value};

use crate::cmd::{self, PROBE_TIMEOUT};
use crate::osinfo;

/// Collect ~20 host metrics: OS identity, kernel, CPU, load, memory, swap,
/// root filesystem, uptime and primary IP. Each failed probe simply leaves
/// its keys out.
pub async fn collect_stats() -> Map<String, Value> {
    let mut stats = Map::new();

    stats.insert("os_info".to_string(), json!(osinfo::os_info().await));

    let os_release = cmd::run("cat", &["/etc/os-release"], PROBE_TIMEOUT).await;
    if os_release.success() {
        if let Some((distribution, version)) = parse_os_release(&os_release.stdout) {
            if let Some(distribution) = distribution {
                stats.insert("os_distribution".to_string(), json!(distribution));
            }
            if let Some(version) = version {
                stats.insert("os_version".to_string(), json!(version));
            }
        }
    }

    let kernel = cmd::run("uname", &["-r"], PROBE_TIMEOUT).await;
    if kernel.success() {
        stats.insert("kernel_version".to_string(), json!(kernel.stdout.trim()));
    }

    let hostname = cmd::run("hostname", &[], PROBE_TIMEOUT).await;
    if hostname.success() {
        stats.insert("hostname".to_string(), json!(hostname.stdout.trim()));
    }

    let arch = cmd::run("uname", &["-m"], PROBE_TIMEOUT).await;
    if arch.success() {
        stats.insert("architecture".to_string(), json!(arch.stdout.trim()));
    }

    let nproc = cmd::run("nproc", &[], PROBE_TIMEOUT).await;
    if nproc.success() {
        if let Ok(cores) = nproc.stdout.trim().parse::<u32>() {
            stats.insert("cpu_cores".to_string(), json!(cores));
        }
    }

    let cpu_model = cmd::sh(
        r#"grep "model name" /proc/cpuinfo | head -1 | cut -d":" -f2"#,
        PROBE_TIMEOUT,
    )
    .await;
    if cpu_model.success() && !cpu_model.stdout.trim().is_empty() {
        stats.insert("cpu_model".to_string(), json!(cpu_model.stdout.trim()));
    }

    let loadavg = cmd::run("cat", &["/proc/loadavg"], PROBE_TIMEOUT).await;
    if loadavg.success() {
        if let Some((load1, load5, load15)) = parse_loadavg(&loadavg.stdout) {
            stats.insert("cpu_load_1".to_string(), json!(load1));
            stats.insert("cpu_load_5".to_string(), json!(load5));
            stats.insert("cpu_load_15".to_string(), json!(load15));
        }
    }

    let free = cmd::run("free", &["-m"], PROBE_TIMEOUT).await;
    if free.success() {
        merge(&mut stats, parse_free(&free.stdout));
    }

    let df = cmd::run("df", &["-BG", "/"], PROBE_TIMEOUT).await;
    if df.success() {
        merge(&mut stats, parse_df_root(&df.stdout));
    }

    let uptime = cmd::run("cat", &["/proc/uptime"], PROBE_TIMEOUT).await;
    if uptime.success() {
        if let Some(seconds) = parse_uptime(&uptime.stdout) {
            stats.insert("uptime_seconds".to_string(), json!(seconds));
            stats.insert(
                "uptime_human".to_string(),
                json!(pba_core::format_uptime(seconds)),
            );
        }
    }

    let ip = cmd::run("hostname", &["-I"], PROBE_TIMEOUT).await;
    if ip.success() {
        if let Some(address) = ip.stdout.split_whitespace().next() {
            stats.insert("ip_address".to_string(), json!(address));
        }
    }

    stats
}

fn merge(stats: &mut Map<String, Value>, extra: Map<String, Value>) {
    for (key, value) in extra {
        stats.insert(key, value);
    }
}

/// NAME= and VERSION= from /etc/os-release, quotes stripped.
pub(crate) fn parse_os_release(contents: &str) -> Option<(Option<String>, Option<String>)> {
    let mut distribution = None;
    let mut version = None;
    for line in contents.lines() {
        if let Some(value) = line.strip_prefix("NAME=") {
            distribution = Some(value.trim_matches('"').to_string());
        } else if let Some(value) = line.strip_prefix("VERSION=") {
            version = Some(value.trim_matches('"').to_string());
        }
    }
    if distribution.is_none() && version.is_none() {
        None
    } else {
        Some((distribution, version))
    }
}

/// The three load averages from /proc/loadavg.
pub(crate) fn parse_loadavg(contents: &str) -> Option<(f64, f64, f64)> {
    let fields: Vec<&str> = contents.split_whitespace().collect();
    if fields.len() < 3 {
        return None;
    }
    Some((
        fields[0].parse().ok()?,
        fields[1].parse().ok()?,
        fields[2].parse().ok()?,
    ))
}

/// Memory and swap rows of `free -m`.
pub(crate) fn parse_free(output: &str) -> Map<String, Value> {
    let mut stats = Map::new();
    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() >= 4 && fields[0] == "Mem:" {
            let total: Option<i64> = fields[1].parse().ok();
            let used: Option<i64> = fields[2].parse().ok();
            if let Some(total) = total {
                stats.insert("memory_total_mb".to_string(), json!(total));
            }
            if let Some(used) = used {
                stats.insert("memory_used_mb".to_string(), json!(used));
            }
            if let Ok(free) = fields[3].parse::<i64>() {
                stats.insert("memory_free_mb".to_string(), json!(free));
            }
            if fields.len() >= 7 {
                if let Ok(available) = fields[6].parse::<i64>() {
                    stats.insert("memory_available_mb".to_string(), json!(available));
                }
            }
            if let (Some(total), Some(used)) = (total, used) {
                if total > 0 {
                    stats.insert(
                        "memory_percent".to_string(),
                        json!(used as f64 / total as f64 * 100.0),
                    );
                }
            }
        } else if fields.len() >= 3 && fields[0] == "Swap:" {
            if let Ok(total) = fields[1].parse::<i64>() {
                stats.insert("swap_total_mb".to_string(), json!(total));
            }
            if let Ok(used) = fields[2].parse::<i64>() {
                stats.insert("swap_used_mb".to_string(), json!(used));
            }
        }
    }
    stats
}

/// Root filesystem usage from `df -BG /`.
pub(crate) fn parse_df_root(output: &str) -> Map<String, Value> {
    let mut stats = Map::new();
    let Some(line) = output.lines().nth(1) else {
        return stats;
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return stats;
    }
    if let Ok(total) = fields[1].trim_end_matches('G').parse::<i64>() {
        stats.insert("disk_total_gb".to_string(), json!(total));
    }
    if let Ok(used) = fields[2].trim_end_matches('G').parse::<i64>() {
        stats.insert("disk_used_gb".to_string(), json!(used));
    }
    if let Ok(free) = fields[3].trim_end_matches('G').parse::<i64>() {
        stats.insert("disk_free_gb".to_string(), json!(free));
    }
    if let Ok(percent) = fields[4].trim_end_matches('%').parse::<i64>() {
        stats.insert("disk_percent".to_string(), json!(percent));
    }
    stats
}

/// Whole seconds from /proc/uptime.
pub(crate) fn parse_uptime(contents: &str) -> Option<u64> {
    let first = contents.split_whitespace().next()?;
    let seconds: f64 = first.parse().ok()?;
    Some(seconds as u64)
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
