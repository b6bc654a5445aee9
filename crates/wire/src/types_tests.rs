// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn bare_progress_report_omits_counters() {
    let report = ProgressReport::percent(40, "Test progress: 40%");
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["progress"], 40);
    assert_eq!(json["message"], "Test progress: 40%");
    assert!(json.get("files_count").is_none());
    assert!(json.get("current_path").is_none());
}

#[test]
fn archiver_progress_report_carries_counters() {
    let report = ProgressReport {
        progress: 10,
        message: Some("Backing up: 120 files, 1.5 MB processed".to_string()),
        files_count: Some(120),
        original_size: Some(1_572_864),
        compressed_size: Some(800_000),
        deduplicated_size: Some(400_000),
        current_path: Some("/etc/hosts".to_string()),
    };
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["files_count"], 120);
    assert_eq!(json["current_path"], "/etc/hosts");
}

#[test]
fn task_page_tolerates_missing_fields() {
    let page: TaskPage = serde_json::from_str("{}").unwrap();
    assert!(page.tasks.is_empty());
    assert_eq!(page.count, 0);

    let page: TaskPage = serde_json::from_str(
        r#"{"tasks": [{"id": 1, "type": "test"}], "count": 1}"#,
    )
    .unwrap();
    assert_eq!(page.tasks.len(), 1);
    assert_eq!(page.tasks[0].id, 1);
}

#[test]
fn task_status_defaults_to_no_cancel() {
    let status: TaskStatus = serde_json::from_str(r#"{"status": "running"}"#).unwrap();
    assert!(!status.should_cancel);

    let status: TaskStatus =
        serde_json::from_str(r#"{"status": "running", "should_cancel": true}"#).unwrap();
    assert!(status.should_cancel);
}
