// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin wrappers over the subprocess engine for short probe commands.

use std::time::Duration;

use pba_adapters::subprocess::{self, ExecResult, ExecSpec};
use tokio_util::sync::CancellationToken;

pub(crate) const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const UNIT_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const LIST_TIMEOUT: Duration = Duration::from_secs(15);
pub(crate) const SIZE_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) async fn run(program: &str, args: &[&str], timeout: Duration) -> ExecResult {
    let spec = ExecSpec::new(program, timeout).args(args.iter().copied());
    subprocess::run(spec, &CancellationToken::new()).await
}

pub(crate) async fn run_sudo(program: &str, args: &[&str], timeout: Duration) -> ExecResult {
    let spec = ExecSpec::new("sudo", timeout)
        .arg(program)
        .args(args.iter().copied());
    subprocess::run(spec, &CancellationToken::new()).await
}

/// Run a shell pipeline. Probes lean on the shell for grep/cut/tail
/// plumbing rather than re-implementing it.
pub(crate) async fn sh(script: &str, timeout: Duration) -> ExecResult {
    let spec = ExecSpec::new("sh", timeout).arg("-c").arg(script);
    subprocess::run(spec, &CancellationToken::new()).await
}

pub(crate) async fn sh_sudo(script: &str, timeout: Duration) -> ExecResult {
    let spec = ExecSpec::new("sudo", timeout)
        .args(["sh", "-c"])
        .arg(script);
    subprocess::run(spec, &CancellationToken::new()).await
}

/// True when `binary` resolves on PATH.
pub(crate) async fn on_path(binary: &str) -> bool {
    run("which", &[binary], PROBE_TIMEOUT).await.success()
}

/// True when the named service unit reports `active`.
pub(crate) async fn unit_active(unit: &str) -> bool {
    let result = run("systemctl", &["is-active", unit], UNIT_TIMEOUT).await;
    result.exit_code == 0 && result.stdout.trim() == "active"
}

/// True when any of the named units reports `active`.
pub(crate) async fn any_unit_active(units: &[&str]) -> bool {
    for unit in units {
        if unit_active(unit).await {
            return true;
        }
    }
    false
}
