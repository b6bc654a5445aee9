// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use pba_core::config::BorgSshConfig;

use super::*;

fn ssh_config() -> BorgSshConfig {
    BorgSshConfig {
        host: "backup.example.com".to_string(),
        port: 2222,
        user: "phpborg-borg".to_string(),
        private_key_path: "/etc/phpborg-agent/ssh/id_rsa".to_string(),
        backup_path: "/srv/backups".to_string(),
    }
}

#[test]
fn remote_env_embeds_port_key_and_repo() {
    let env = remote_env(&ssh_config());

    let rsh = env.iter().find(|(k, _)| k == "BORG_RSH").unwrap();
    assert_eq!(
        rsh.1,
        "ssh -p 2222 -i /etc/phpborg-agent/ssh/id_rsa -o StrictHostKeyChecking=no"
    );

    let repo = env.iter().find(|(k, _)| k == "BORG_REPO").unwrap();
    assert_eq!(repo.1, "phpborg-borg@backup.example.com:/srv/backups");
}

#[test]
fn create_spec_assembles_flags_target_and_paths() {
    let create = CreateArchive {
        repo_path: "web-01/system".to_string(),
        archive_name: "system-20260801".to_string(),
        paths: vec!["/etc".to_string(), "/home".to_string()],
        excludes: vec!["/home/*/.cache".to_string(), String::new()],
        compression: Some("zstd,3".to_string()),
        passphrase: None,
    };

    let spec = create.spec(&ssh_config());

    assert_eq!(
        spec.args,
        vec![
            "create",
            "--verbose",
            "--stats",
            "--progress",
            "--log-json",
            "--compression",
            "zstd,3",
            "--exclude",
            "/home/*/.cache",
            "web-01/system::system-20260801",
            "/etc",
            "/home",
        ]
    );
    assert_eq!(spec.timeout, ARCHIVE_TIMEOUT);
}

#[test]
fn passphrase_goes_through_env_not_argv() {
    let create = CreateArchive {
        repo_path: "web-01/system".to_string(),
        archive_name: "a".to_string(),
        paths: vec!["/etc".to_string()],
        excludes: Vec::new(),
        compression: None,
        passphrase: Some("s3cret".to_string()),
    };

    let spec = create.spec(&ssh_config());

    assert!(!spec.args.iter().any(|a| a.contains("s3cret")));
    assert!(spec
        .env
        .iter()
        .any(|(k, v)| k == "BORG_PASSPHRASE" && v == "s3cret"));
}

#[test]
fn extract_spec_runs_in_destination_dir() {
    let extract = ExtractArchive {
        repo_path: "web-01/system".to_string(),
        archive_name: "system-20260801".to_string(),
        dest_path: "/var/restore".into(),
        patterns: vec!["etc/nginx".to_string()],
    };

    let spec = extract.spec(&ssh_config());

    assert_eq!(
        spec.args,
        vec![
            "extract",
            "--verbose",
            "--progress",
            "web-01/system::system-20260801",
            "etc/nginx",
        ]
    );
    assert_eq!(spec.cwd.as_deref(), Some(std::path::Path::new("/var/restore")));
}
