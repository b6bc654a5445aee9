// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess engine: launch, timeout, cancellation, output capture and
//! streaming progress parsing.
//!
//! On unix every child is made the leader of a fresh process group so that
//! a kill reaches helpers it spawned in turn (the archiver's ssh child, for
//! example). On other platforms only the direct child is killed.

use std::process::Stdio;
use std::time::{Duration, Instant};

use pba_core::ArchiveProgress;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

/// Description of a single subprocess run.
#[derive(Debug, Clone)]
pub struct ExecSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment entries layered over the inherited environment.
    pub env: Vec<(String, String)>,
    pub cwd: Option<std::path::PathBuf>,
    pub timeout: Duration,
}

impl ExecSpec {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn cwd(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

/// Engine-level failures, distinct from a nonzero exit of the child.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} timed out after {after_secs}s")]
    Timeout { program: String, after_secs: u64 },
    #[error("{program} cancelled")]
    Cancelled { program: String },
    #[error("i/o error while running {program}: {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },
}

/// Outcome of a subprocess run.
#[derive(Debug)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    /// Child exit code; −1 for timeouts, cancellation and engine errors.
    pub exit_code: i32,
    pub duration: Duration,
    pub error: Option<ExecError>,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }

    fn engine_failure(error: ExecError, duration: Duration) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: -1,
            duration,
            error: Some(error),
        }
    }
}

/// Run a command to completion, buffering stdout and stderr.
pub async fn run(spec: ExecSpec, cancel: &CancellationToken) -> ExecResult {
    let start = Instant::now();
    let mut child = match spawn(&spec) {
        Ok(child) => child,
        Err(error) => return ExecResult::engine_failure(error, start.elapsed()),
    };
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    tokio::select! {
        result = wait_buffered(&spec, &mut child, stdout, stderr) => {
            finish(result, start)
        }
        () = tokio::time::sleep(spec.timeout) => {
            tracing::warn!(program = %spec.program, "deadline passed, killing process group");
            kill_group(&mut child).await;
            ExecResult::engine_failure(
                ExecError::Timeout {
                    program: spec.program.clone(),
                    after_secs: spec.timeout.as_secs(),
                },
                start.elapsed(),
            )
        }
        () = cancel.cancelled() => {
            tracing::debug!(program = %spec.program, "cancelled, killing process group");
            kill_group(&mut child).await;
            ExecResult::engine_failure(
                ExecError::Cancelled { program: spec.program.clone() },
                start.elapsed(),
            )
        }
    }
}

/// Run a command in streaming mode: stderr is scanned line by line and each
/// line that parses as an `archive_progress` JSON event invokes the callback
/// on the reading path. Every line, recognised or not, lands in the stderr
/// buffer.
pub async fn run_streaming(
    spec: ExecSpec,
    cancel: &CancellationToken,
    on_progress: &mut (dyn FnMut(ArchiveProgress) + Send),
) -> ExecResult {
    let start = Instant::now();
    let mut child = match spawn(&spec) {
        Ok(child) => child,
        Err(error) => return ExecResult::engine_failure(error, start.elapsed()),
    };
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    tokio::select! {
        result = wait_streaming(&spec, &mut child, stdout, stderr, on_progress) => {
            finish(result, start)
        }
        () = tokio::time::sleep(spec.timeout) => {
            tracing::warn!(program = %spec.program, "deadline passed, killing process group");
            kill_group(&mut child).await;
            ExecResult::engine_failure(
                ExecError::Timeout {
                    program: spec.program.clone(),
                    after_secs: spec.timeout.as_secs(),
                },
                start.elapsed(),
            )
        }
        () = cancel.cancelled() => {
            tracing::debug!(program = %spec.program, "cancelled, killing process group");
            kill_group(&mut child).await;
            ExecResult::engine_failure(
                ExecError::Cancelled { program: spec.program.clone() },
                start.elapsed(),
            )
        }
    }
}

/// Parse one stderr line as an archiver progress event. Returns `None` for
/// non-JSON lines and for JSON lines with a different event tag.
pub fn parse_progress_line(line: &str) -> Option<ArchiveProgress> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    if value.get("type").and_then(|t| t.as_str()) != Some("archive_progress") {
        return None;
    }
    serde_json::from_value(value).ok()
}

fn spawn(spec: &ExecSpec) -> Result<Child, ExecError> {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in &spec.env {
        command.env(key, value);
    }
    if let Some(cwd) = &spec.cwd {
        command.current_dir(cwd);
    }

    // Put the child at the head of a new process group so kill_group can
    // reach its own children.
    #[cfg(unix)]
    unsafe {
        command.pre_exec(|| {
            if libc::setpgid(0, 0) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    command.spawn().map_err(|source| ExecError::Spawn {
        program: spec.program.clone(),
        source,
    })
}

async fn wait_buffered(
    spec: &ExecSpec,
    child: &mut Child,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
) -> Result<(i32, String, String), ExecError> {
    let (status, stdout, stderr) = tokio::join!(
        child.wait(),
        read_to_string(stdout),
        read_to_string(stderr),
    );
    let status = status.map_err(|source| ExecError::Io {
        program: spec.program.clone(),
        source,
    })?;
    Ok((status.code().unwrap_or(-1), stdout, stderr))
}

async fn wait_streaming(
    spec: &ExecSpec,
    child: &mut Child,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    on_progress: &mut (dyn FnMut(ArchiveProgress) + Send),
) -> Result<(i32, String, String), ExecError> {
    let scan = async {
        let mut buffer = String::new();
        let Some(stderr) = stderr else {
            return buffer;
        };
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            buffer.push_str(&line);
            buffer.push('\n');
            if let Some(progress) = parse_progress_line(&line) {
                on_progress(progress);
            }
        }
        buffer
    };

    let (status, stdout, stderr) = tokio::join!(child.wait(), read_to_string(stdout), scan);
    let status = status.map_err(|source| ExecError::Io {
        program: spec.program.clone(),
        source,
    })?;
    Ok((status.code().unwrap_or(-1), stdout, stderr))
}

async fn read_to_string<R: tokio::io::AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut buffer = Vec::new();
    if let Some(mut reader) = reader {
        let _ = reader.read_to_end(&mut buffer).await;
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

fn finish(result: Result<(i32, String, String), ExecError>, start: Instant) -> ExecResult {
    let duration = start.elapsed();
    match result {
        Ok((exit_code, stdout, stderr)) => ExecResult {
            stdout,
            stderr,
            exit_code,
            duration,
            error: None,
        },
        Err(error) => ExecResult::engine_failure(error, duration),
    }
}

/// Kill the child's whole process group where the platform has the concept,
/// then reap the direct child.
async fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    }
    let _ = child.kill().await;
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
