// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn df_line_yields_device_and_mountpoint() {
    let line = "/dev/mapper/vg0-data 103081248 41022096 56797568 42% /var/lib/mysql";
    let (device, mountpoint) = parse_df_line(line).unwrap();
    assert_eq!(device, "/dev/mapper/vg0-data");
    assert_eq!(mountpoint, "/var/lib/mysql");

    assert!(parse_df_line("garbage").is_none());
}

#[test]
fn lvs_fields_strip_the_byte_suffix() {
    let (lv, vg, size) = parse_lvs_fields("  data vg0 53687091200B").unwrap();
    assert_eq!(lv, "data");
    assert_eq!(vg, "vg0");
    assert_eq!(size, "53687091200");

    assert!(parse_lvs_fields("data vg0").is_none());
}

#[test]
fn debian_cnf_credentials_parse() {
    let contents = r#"
[client]
host     = localhost
user     = debian-sys-maint
password = Wx7hGq2p
socket   = /var/run/mysqld/mysqld.sock
"#;
    let (user, password) = parse_debian_cnf(contents).unwrap();
    assert_eq!(user, "debian-sys-maint");
    assert_eq!(password, "Wx7hGq2p");

    assert!(parse_debian_cnf("[client]\nhost = localhost\n").is_none());
}

#[test]
fn pg_clusters_parse_with_and_without_datadir() {
    let output = "14 main 5432 online postgres /var/lib/postgresql/14/main\n15 main 5433 down postgres\n";
    let clusters = parse_pg_clusters(output);

    assert_eq!(clusters.len(), 2);
    assert_eq!(clusters[0]["version"], "14");
    assert_eq!(clusters[0]["data_directory"], "/var/lib/postgresql/14/main");
    assert_eq!(clusters[1]["status"], "down");
    assert!(clusters[1].get("data_directory").is_none());
}

#[test]
fn datadir_resolution_keeps_first_hit_and_all_candidates() {
    let mut resolution = DataDirResolution::new();
    resolution.accept("/var/lib/mysql".to_string(), "sql_query", "high");
    resolution.accept("/data/mysql".to_string(), "config_file", "medium");

    assert_eq!(resolution.path.as_deref(), Some("/var/lib/mysql"));
    assert_eq!(resolution.confidence, "high");
    assert_eq!(resolution.candidates.len(), 2);
    assert_eq!(resolution.candidates[1]["method"], "config_file");
}
