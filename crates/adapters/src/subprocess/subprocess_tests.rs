// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::*;

fn sh(script: &str, timeout: Duration) -> ExecSpec {
    ExecSpec::new("sh", timeout).arg("-c").arg(script)
}

#[tokio::test]
async fn captures_stdout_stderr_and_exit_code() {
    let cancel = CancellationToken::new();
    let result = run(
        sh("echo out; echo err >&2; exit 3", Duration::from_secs(5)),
        &cancel,
    )
    .await;

    assert_eq!(result.exit_code, 3);
    assert_eq!(result.stdout.trim(), "out");
    assert_eq!(result.stderr.trim(), "err");
    assert!(result.error.is_none());
    assert!(!result.success());
}

#[tokio::test]
async fn success_requires_zero_exit_and_no_error() {
    let cancel = CancellationToken::new();
    let result = run(sh("true", Duration::from_secs(5)), &cancel).await;
    assert!(result.success());
}

#[tokio::test]
async fn extra_env_reaches_the_child() {
    let cancel = CancellationToken::new();
    let spec = sh("printf %s \"$PBA_PROBE\"", Duration::from_secs(5)).env("PBA_PROBE", "on");
    let result = run(spec, &cancel).await;

    assert_eq!(result.stdout, "on");
}

#[tokio::test]
async fn timeout_kills_and_reports_minus_one() {
    let cancel = CancellationToken::new();
    let start = std::time::Instant::now();
    let result = run(sh("sleep 30", Duration::from_millis(200)), &cancel).await;

    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(result.exit_code, -1);
    assert!(matches!(result.error, Some(ExecError::Timeout { .. })));
}

#[tokio::test]
async fn cancellation_kills_and_reports_minus_one() {
    let cancel = CancellationToken::new();
    let task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { run(sh("sleep 30", Duration::from_secs(60)), &cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    let result = task.await.unwrap();

    assert_eq!(result.exit_code, -1);
    assert!(matches!(result.error, Some(ExecError::Cancelled { .. })));
}

#[tokio::test]
async fn missing_binary_is_an_engine_error() {
    let cancel = CancellationToken::new();
    let result = run(
        ExecSpec::new("definitely-not-a-real-binary", Duration::from_secs(5)),
        &cancel,
    )
    .await;

    assert_eq!(result.exit_code, -1);
    assert!(matches!(result.error, Some(ExecError::Spawn { .. })));
}

#[tokio::test]
async fn streaming_forwards_only_archive_progress_events() {
    let cancel = CancellationToken::new();
    let script = r#"
echo '{"type":"archive_progress","nfiles":1,"original_size":100,"compressed_size":60,"deduplicated_size":30,"path":"/etc/hosts"}' >&2
echo '{"type":"file_status","status":"A","path":"/etc/hosts"}' >&2
echo 'plain text warning' >&2
echo '{"type":"archive_progress","nfiles":2,"original_size":200,"compressed_size":120,"deduplicated_size":60,"path":"/etc/passwd"}' >&2
"#;

    let mut samples = Vec::new();
    let result = run_streaming(sh(script, Duration::from_secs(5)), &cancel, &mut |p| {
        samples.push(p)
    })
    .await;

    assert_eq!(result.exit_code, 0);
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].nfiles, 1);
    assert_eq!(samples[1].path, "/etc/passwd");
    // Every stderr line is preserved, recognised or not.
    assert!(result.stderr.contains("file_status"));
    assert!(result.stderr.contains("plain text warning"));
}

#[tokio::test]
async fn streaming_counters_are_monotonic_for_a_well_behaved_child() {
    let cancel = CancellationToken::new();
    let script = r#"
for n in 1 2 3; do
  echo "{\"type\":\"archive_progress\",\"nfiles\":$n,\"original_size\":$((n*100)),\"compressed_size\":$((n*50)),\"deduplicated_size\":$((n*25)),\"path\":\"/f$n\"}" >&2
done
"#;

    let mut samples = Vec::new();
    run_streaming(sh(script, Duration::from_secs(5)), &cancel, &mut |p| {
        samples.push(p)
    })
    .await;

    for pair in samples.windows(2) {
        assert!(pair[1].nfiles >= pair[0].nfiles);
        assert!(pair[1].original_size >= pair[0].original_size);
        assert!(pair[1].compressed_size >= pair[0].compressed_size);
        assert!(pair[1].deduplicated_size >= pair[0].deduplicated_size);
    }
}

#[test]
fn progress_line_parsing_ignores_junk() {
    assert!(parse_progress_line("not json at all").is_none());
    assert!(parse_progress_line(r#"{"type":"log_message","message":"hi"}"#).is_none());
    assert!(parse_progress_line(r#"{"nfiles": 3}"#).is_none());

    let progress = parse_progress_line(
        r#"{"type":"archive_progress","nfiles":5,"original_size":10,"compressed_size":6,"deduplicated_size":3,"path":"/x","finished":false}"#,
    )
    .unwrap();
    assert_eq!(progress.nfiles, 5);
    assert_eq!(progress.path, "/x");
    assert!(!progress.finished);
}
