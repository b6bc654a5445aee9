// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Database engine detection.
//!
//! Every engine follows the same shape: absent when the binary is not on
//! PATH, `{detected, running: false}` when the service unit is inactive,
//! and otherwise version, data directory (resolved by sql query → config
//! file → process args, with confidence labels), data size, and the
//! snapshot capability of the backing volume.

use serde_json::{json, Value};

use crate::cmd::{self, PROBE_TIMEOUT, SIZE_TIMEOUT, UNIT_TIMEOUT};

pub(crate) async fn detect_databases() -> Vec<Value> {
    let mut engines = Vec::new();
    if let Some(mysql) = detect_mysql().await {
        engines.push(mysql);
    }
    if let Some(postgres) = detect_postgres().await {
        engines.push(postgres);
    }
    if let Some(mongodb) = detect_mongodb().await {
        engines.push(mongodb);
    }
    if let Some(redis) = detect_redis().await {
        engines.push(redis);
    }
    engines
}

/// A resolved data directory with the evidence trail that produced it.
#[derive(Default)]
struct DataDirResolution {
    path: Option<String>,
    confidence: &'static str,
    candidates: Vec<Value>,
}

impl DataDirResolution {
    fn new() -> Self {
        Self {
            path: None,
            confidence: "unknown",
            candidates: Vec::new(),
        }
    }

    fn accept(&mut self, path: String, method: &str, confidence: &'static str) {
        self.candidates.push(json!({
            "path": path,
            "method": method,
            "confidence": confidence,
        }));
        if self.path.is_none() {
            self.path = Some(path);
            self.confidence = confidence;
        }
    }

    fn fallback(&mut self, path: &str) {
        self.candidates.push(json!({
            "path": path,
            "method": "common_location",
            "confidence": "low",
        }));
    }
}

fn engine_skeleton(kind: &str, name: &str) -> Value {
    json!({
        "type": kind,
        "name": name,
        "detected": true,
        "running": false,
        "version": null,
        "datadir": null,
        "datadir_detected": false,
        "datadir_confidence": "unknown",
        "datadir_candidates": [],
        "datadir_size": null,
        "volume": null,
        "snapshot_capable": false,
    })
}

/// Fill the datadir/volume section shared by every engine.
async fn apply_datadir(info: &mut Value, mut resolution: DataDirResolution, fallback: &str) {
    if let Some(datadir) = resolution.path.clone() {
        info["datadir"] = json!(datadir);
        info["datadir_detected"] = json!(true);
        info["datadir_confidence"] = json!(resolution.confidence);

        if let Some(bytes) = datadir_size(&datadir).await {
            info["datadir_size"] = json!(bytes);
            info["datadir_size_human"] = json!(pba_core::format_bytes(bytes));
        }

        if let Some(volume) = volume_for_path(&datadir).await {
            info["snapshot_capable"] = volume["snapshot_capable"].clone();
            info["volume"] = volume;
        }
    } else {
        resolution.fallback(fallback);
    }
    info["datadir_candidates"] = Value::Array(resolution.candidates);
}

async fn datadir_size(path: &str) -> Option<i64> {
    let result = cmd::sh(
        &format!("du -sb {} 2>/dev/null | cut -f1", path),
        SIZE_TIMEOUT,
    )
    .await;
    if !result.success() {
        return None;
    }
    result.stdout.trim().parse().ok()
}

// ── MySQL / MariaDB ──────────────────────────────────────────────────

async fn detect_mysql() -> Option<Value> {
    if !cmd::on_path("mysql").await {
        return None;
    }

    let mut info = engine_skeleton("mysql", "MySQL/MariaDB");

    let version = cmd::run("mysql", &["--version"], PROBE_TIMEOUT).await;
    if version.success() {
        info["version"] = json!(version.stdout.trim());
    }

    let running = cmd::any_unit_active(&["mysql", "mariadb", "mysqld"]).await;
    info["running"] = json!(running);
    if !running {
        return Some(info);
    }

    info["auth"] = detect_mysql_auth().await;

    let mut resolution = DataDirResolution::new();

    let sql = cmd::sh(
        r#"mysql -e "SELECT @@datadir" 2>/dev/null | tail -n1"#,
        PROBE_TIMEOUT,
    )
    .await;
    if sql.success() {
        let datadir = sql.stdout.trim();
        if !datadir.is_empty() && !datadir.contains("ERROR") && !datadir.contains("datadir") {
            resolution.accept(datadir.to_string(), "sql_query", "high");
        }
    }

    if resolution.path.is_none() {
        let conf = cmd::sh(
            r#"grep -E "^datadir" /etc/mysql/my.cnf /etc/my.cnf /etc/mysql/mysql.conf.d/*.cnf 2>/dev/null | head -n1 | cut -d= -f2"#,
            PROBE_TIMEOUT,
        )
        .await;
        if conf.success() && !conf.stdout.trim().is_empty() {
            resolution.accept(conf.stdout.trim().to_string(), "config_file", "medium");
        }
    }

    if resolution.path.is_none() {
        let proc = cmd::sh(
            r#"ps aux | grep mysqld | grep -oP -- '--datadir=\K[^ ]+' | head -n1"#,
            PROBE_TIMEOUT,
        )
        .await;
        if proc.success() && !proc.stdout.trim().is_empty() {
            resolution.accept(proc.stdout.trim().to_string(), "process_args", "medium");
        }
    }

    apply_datadir(&mut info, resolution, "/var/lib/mysql").await;
    Some(info)
}

async fn detect_mysql_auth() -> Value {
    // Root without password first.
    let root = cmd::sh(r#"mysql -u root -e "SELECT 1" 2>&1"#, UNIT_TIMEOUT).await;
    if root.success() && !root.stdout.contains("ERROR") {
        return json!({
            "method": "root_no_password",
            "working": true,
            "host": "localhost",
            "port": 3306,
            "user": "root",
            "password": "",
        });
    }

    // Debian/Ubuntu maintenance credentials.
    let debian = cmd::sh("cat /etc/mysql/debian.cnf 2>/dev/null", UNIT_TIMEOUT).await;
    if debian.success() {
        if let Some((user, password)) = parse_debian_cnf(&debian.stdout) {
            let test = cmd::sh(
                &format!("mysql -u{} -p{} -e 'SELECT 1' 2>&1", user, password),
                UNIT_TIMEOUT,
            )
            .await;
            if test.success() && !test.stdout.contains("ERROR") {
                return json!({
                    "method": "debian_cnf",
                    "working": true,
                    "host": "localhost",
                    "port": 3306,
                    "user": user,
                    "password": password,
                });
            }
        }
    }

    json!({
        "method": null,
        "working": false,
        "host": "localhost",
        "port": 3306,
        "user": null,
        "password": null,
    })
}

/// Pull `user` and `password` out of a debian.cnf maintenance section.
pub(crate) fn parse_debian_cnf(contents: &str) -> Option<(String, String)> {
    let mut user = None;
    let mut password = String::new();
    for line in contents.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("user") {
            if let Some(value) = value.trim_start().strip_prefix('=') {
                user.get_or_insert_with(|| value.trim().to_string());
            }
        } else if let Some(value) = line.strip_prefix("password") {
            if let Some(value) = value.trim_start().strip_prefix('=') {
                if password.is_empty() {
                    password = value.trim().to_string();
                }
            }
        }
    }
    user.map(|u| (u, password))
}

// ── PostgreSQL ───────────────────────────────────────────────────────

async fn detect_postgres() -> Option<Value> {
    if !cmd::on_path("psql").await {
        return None;
    }

    let mut info = engine_skeleton("postgresql", "PostgreSQL");

    let version = cmd::run("psql", &["--version"], PROBE_TIMEOUT).await;
    if version.success() {
        info["version"] = json!(version.stdout.trim());
    }

    let running = cmd::unit_active("postgresql").await;
    info["running"] = json!(running);
    if !running {
        return Some(info);
    }

    info["auth"] = detect_postgres_auth().await;

    let mut resolution = DataDirResolution::new();

    let sql = cmd::sh_sudo(
        r#"su - postgres -c "psql -t -c 'SHOW data_directory'" 2>/dev/null"#,
        PROBE_TIMEOUT,
    )
    .await;
    if sql.success() {
        let datadir = sql.stdout.trim();
        if !datadir.is_empty() && !datadir.contains("ERROR") {
            resolution.accept(datadir.to_string(), "sql_query", "high");
        }
    }

    if resolution.path.is_none() {
        let proc = cmd::sh(
            r#"ps aux | grep postgres | grep -oP -- '-D\s*\K[^ ]+' | head -n1"#,
            PROBE_TIMEOUT,
        )
        .await;
        if proc.success() && !proc.stdout.trim().is_empty() {
            resolution.accept(proc.stdout.trim().to_string(), "process_args", "medium");
        }
    }

    apply_datadir(&mut info, resolution, "/var/lib/postgresql").await;
    Some(info)
}

async fn detect_postgres_auth() -> Value {
    let peer = cmd::sh_sudo(r#"su - postgres -c "psql -c 'SELECT 1'" 2>&1"#, UNIT_TIMEOUT).await;
    if peer.success() && !peer.stdout.contains("ERROR") {
        let mut auth = json!({
            "method": "peer_auth",
            "working": true,
            "peer_auth": true,
            "clusters": [],
            "user": "postgres",
            "password": null,
        });

        let clusters = cmd::sh_sudo(
            r#"su - postgres -c "pg_lsclusters --no-header" 2>/dev/null"#,
            UNIT_TIMEOUT,
        )
        .await;
        if clusters.success() && !clusters.stdout.trim().is_empty() {
            auth["clusters"] = Value::Array(parse_pg_clusters(&clusters.stdout));
        }
        return auth;
    }

    json!({
        "method": null,
        "working": false,
        "peer_auth": false,
        "clusters": [],
        "user": null,
        "password": null,
    })
}

/// Parse `pg_lsclusters --no-header` output into cluster records.
pub(crate) fn parse_pg_clusters(output: &str) -> Vec<Value> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 5 {
                return None;
            }
            let mut cluster = json!({
                "version": parts[0],
                "cluster": parts[1],
                "port": parts[2],
                "status": parts[3],
                "owner": parts[4],
            });
            if parts.len() >= 6 {
                cluster["data_directory"] = json!(parts[5]);
            }
            Some(cluster)
        })
        .collect()
}

// ── MongoDB ──────────────────────────────────────────────────────────

async fn detect_mongodb() -> Option<Value> {
    if !cmd::on_path("mongod").await {
        return None;
    }

    let mut info = engine_skeleton("mongodb", "MongoDB");

    let version = cmd::sh("mongod --version 2>/dev/null | head -n1", PROBE_TIMEOUT).await;
    if version.success() {
        info["version"] = json!(version.stdout.trim());
    }

    let running = cmd::unit_active("mongod").await;
    info["running"] = json!(running);
    if !running {
        return Some(info);
    }

    let mut resolution = DataDirResolution::new();

    let conf = cmd::sh(
        r#"grep -E "^\s*dbPath:" /etc/mongod.conf 2>/dev/null | awk '{print $2}'"#,
        PROBE_TIMEOUT,
    )
    .await;
    if conf.success() && !conf.stdout.trim().is_empty() {
        resolution.accept(conf.stdout.trim().to_string(), "config_file", "medium");
    }

    if resolution.path.is_none() {
        let proc = cmd::sh(
            r#"ps aux | grep mongod | grep -oP -- '--dbpath[= ]\K[^ ]+' | head -n1"#,
            PROBE_TIMEOUT,
        )
        .await;
        if proc.success() && !proc.stdout.trim().is_empty() {
            resolution.accept(proc.stdout.trim().to_string(), "process_args", "medium");
        }
    }

    apply_datadir(&mut info, resolution, "/var/lib/mongodb").await;
    Some(info)
}

// ── Redis ────────────────────────────────────────────────────────────

async fn detect_redis() -> Option<Value> {
    if !cmd::on_path("redis-server").await {
        return None;
    }

    let mut info = json!({
        "type": "redis",
        "name": "Redis",
        "detected": true,
        "running": false,
        "version": null,
        "datadir": "/var/lib/redis",
    });

    let version = cmd::run("redis-server", &["--version"], PROBE_TIMEOUT).await;
    if version.success() {
        info["version"] = json!(version.stdout.trim());
    }

    info["running"] = json!(cmd::any_unit_active(&["redis", "redis-server"]).await);
    Some(info)
}

// ── Volume classification ────────────────────────────────────────────

/// Classify the mount backing `path` as standard/lvm/btrfs/zfs and report
/// whether it can take snapshots.
pub(crate) async fn volume_for_path(path: &str) -> Option<Value> {
    let df = cmd::sh(
        &format!("df -P '{}' 2>/dev/null | tail -n1", path),
        PROBE_TIMEOUT,
    )
    .await;
    if !df.success() {
        return None;
    }
    let (device, mountpoint) = parse_df_line(df.stdout.trim())?;

    let mut volume = json!({
        "device": device,
        "mountpoint": mountpoint,
        "type": "standard",
        "snapshot_capable": false,
    });

    // LVM: lvs recognises the device when it is a logical volume.
    let lvs = cmd::sh_sudo(
        &format!(
            "lvs --noheadings --units b -o lv_name,vg_name,lv_size '{}' 2>/dev/null",
            device
        ),
        PROBE_TIMEOUT,
    )
    .await;
    if lvs.success() {
        if let Some((lv_name, vg_name, lv_size)) = parse_lvs_fields(lvs.stdout.trim()) {
            volume["type"] = json!("lvm");
            volume["snapshot_capable"] = json!(true);
            volume["lv_name"] = json!(lv_name);
            volume["vg_name"] = json!(vg_name);
            volume["lv_size"] = json!(lv_size);

            let vgs = cmd::sh_sudo(
                &format!(
                    "vgs --noheadings --units b -o vg_free '{}' 2>/dev/null",
                    vg_name
                ),
                PROBE_TIMEOUT,
            )
            .await;
            if vgs.success() {
                let vg_free = vgs.stdout.trim().trim_end_matches('B').to_string();
                if !vg_free.is_empty() {
                    if let Ok(bytes) = vg_free.parse::<i64>() {
                        volume["vg_free_bytes"] = json!(bytes);
                        volume["vg_free_human"] = json!(pba_core::format_bytes(bytes));
                    }
                    volume["vg_free"] = json!(vg_free);
                }
            }
        }
    }

    // Btrfs mount?
    let btrfs = cmd::sh_sudo(
        &format!("btrfs filesystem show '{}' 2>/dev/null", mountpoint),
        PROBE_TIMEOUT,
    )
    .await;
    if btrfs.success() && !btrfs.stdout.trim().is_empty() {
        volume["type"] = json!("btrfs");
        volume["snapshot_capable"] = json!(true);
    }

    // ZFS dataset?
    let zfs = cmd::sh(
        &format!("zfs list -H -o name,avail '{}' 2>/dev/null", mountpoint),
        PROBE_TIMEOUT,
    )
    .await;
    if zfs.success() && !zfs.stdout.trim().is_empty() {
        volume["type"] = json!("zfs");
        volume["snapshot_capable"] = json!(true);
        let fields: Vec<&str> = zfs.stdout.trim().split_whitespace().collect();
        if fields.len() >= 2 {
            volume["zfs_dataset"] = json!(fields[0]);
            volume["zfs_avail"] = json!(fields[1]);
        }
    }

    Some(volume)
}

/// Pull (device, mountpoint) from one `df -P` data line.
pub(crate) fn parse_df_line(line: &str) -> Option<(String, String)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 6 {
        return None;
    }
    Some((fields[0].to_string(), fields[5].to_string()))
}

/// Pull (lv_name, vg_name, lv_size) from one `lvs` data line, stripping
/// the byte-unit suffix off the size.
pub(crate) fn parse_lvs_fields(line: &str) -> Option<(String, String, String)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 {
        return None;
    }
    Some((
        fields[0].to_string(),
        fields[1].to_string(),
        fields[2].trim_end_matches('B').to_string(),
    ))
}

#[cfg(test)]
#[path = "databases_tests.rs"]
mod tests;
