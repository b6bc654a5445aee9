// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress reporting with a one-per-second throttle for streamed samples.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pba_adapters::ApiClient;
use pba_core::{format_bytes, ArchiveProgress, Clock};
use pba_wire::ProgressReport;

/// Minimum spacing between two throttled progress reports for one task.
pub const PROGRESS_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Posts progress for a single task. Handler milestones go out directly;
/// archiver samples pass through `allow()` so at most one report per
/// second reaches the control plane.
pub(crate) struct ProgressSink<C: Clock> {
    client: Arc<ApiClient>,
    task_id: i64,
    clock: C,
    last_sent: Mutex<Option<std::time::Instant>>,
}

impl<C: Clock> ProgressSink<C> {
    pub(crate) fn new(client: Arc<ApiClient>, task_id: i64, clock: C) -> Self {
        Self {
            client,
            task_id,
            clock,
            last_sent: Mutex::new(None),
        }
    }

    /// Post a milestone directly.
    pub(crate) async fn update(&self, progress: u8, message: impl Into<String>) {
        self.post(ProgressReport::percent(progress, message)).await;
    }

    /// Throttle gate for streamed samples. Claims the slot when it returns
    /// true, so callers must follow through with a post.
    pub(crate) fn allow(&self) -> bool {
        let mut last = self.last_sent.lock();
        let now = self.clock.now();
        if let Some(previous) = *last {
            if now.duration_since(previous) < PROGRESS_MIN_INTERVAL {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    /// Post an archiver sample with its counters.
    pub(crate) async fn post_archive(&self, sample: &ArchiveProgress) {
        let report = ProgressReport {
            progress: 10,
            message: Some(format!(
                "Backing up: {} files, {} processed",
                sample.nfiles,
                format_bytes(sample.original_size)
            )),
            files_count: Some(sample.nfiles),
            original_size: Some(sample.original_size),
            compressed_size: Some(sample.compressed_size),
            deduplicated_size: Some(sample.deduplicated_size),
            current_path: Some(sample.path.clone()),
        };
        self.post(report).await;
    }

    async fn post(&self, report: ProgressReport) {
        if let Err(error) = self.client.report_progress(self.task_id, &report).await {
            tracing::warn!(task_id = self.task_id, %error, "progress report failed");
        }
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
