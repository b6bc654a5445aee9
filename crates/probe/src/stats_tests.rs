// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn os_release_yields_name_and_version() {
    let contents = "NAME=\"Ubuntu\"\nVERSION=\"22.04.4 LTS (Jammy Jellyfish)\"\nID=ubuntu\n";
    let (distribution, version) = parse_os_release(contents).unwrap();
    assert_eq!(distribution.as_deref(), Some("Ubuntu"));
    assert_eq!(version.as_deref(), Some("22.04.4 LTS (Jammy Jellyfish)"));

    assert!(parse_os_release("ID=alpine\n").is_none());
}

#[test]
fn loadavg_parses_three_values() {
    let (l1, l5, l15) = parse_loadavg("0.52 0.58 0.59 1/389 12345\n").unwrap();
    assert_eq!(l1, 0.52);
    assert_eq!(l5, 0.58);
    assert_eq!(l15, 0.59);

    assert!(parse_loadavg("0.52").is_none());
}

#[test]
fn free_output_yields_memory_and_swap() {
    let output = "\
               total        used        free      shared  buff/cache   available
Mem:            7957        2514         512         101        4930        5080
Swap:           2047         256        1791
";
    let stats = parse_free(output);

    assert_eq!(stats["memory_total_mb"], 7957);
    assert_eq!(stats["memory_used_mb"], 2514);
    assert_eq!(stats["memory_free_mb"], 512);
    assert_eq!(stats["memory_available_mb"], 5080);
    assert_eq!(stats["swap_total_mb"], 2047);
    assert_eq!(stats["swap_used_mb"], 256);

    let percent = stats["memory_percent"].as_f64().unwrap();
    assert!((percent - 31.59).abs() < 0.1);
}

#[test]
fn df_root_strips_unit_suffixes() {
    let output = "\
Filesystem     1G-blocks  Used Available Use% Mounted on
/dev/vda1            98G   41G       53G  44% /
";
    let stats = parse_df_root(output);

    assert_eq!(stats["disk_total_gb"], 98);
    assert_eq!(stats["disk_used_gb"], 41);
    assert_eq!(stats["disk_free_gb"], 53);
    assert_eq!(stats["disk_percent"], 44);
}

#[test]
fn uptime_truncates_to_whole_seconds() {
    assert_eq!(parse_uptime("351735.24 1380336.32\n"), Some(351_735));
    assert!(parse_uptime("").is_none());
}

#[tokio::test]
async fn collect_stats_produces_core_metrics() {
    // Runs real probes; only assert on keys that exist on any Linux host.
    let stats = collect_stats().await;
    assert!(stats.contains_key("os_info"));
    assert!(stats.contains_key("kernel_version"));
    assert!(stats.contains_key("hostname"));
    assert!(stats.contains_key("architecture"));
}
