// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker: per-task lifecycle from dequeue to terminal report.

use std::sync::Arc;
use std::time::Instant;

use pba_adapters::ApiClient;
use pba_core::{format_elapsed, Clock, Config, Task};
use pba_wire::{CompleteRequest, FailRequest};
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::handlers::{self, TaskCtx};
use crate::progress::ProgressSink;

pub(super) struct Worker<C: Clock> {
    slot: usize,
    client: Arc<ApiClient>,
    config: Arc<Config>,
    clock: C,
}

impl<C: Clock> Worker<C> {
    pub(super) fn new(slot: usize, client: Arc<ApiClient>, config: Arc<Config>, clock: C) -> Self {
        Self {
            slot,
            client,
            config,
            clock,
        }
    }

    /// Dequeue, execute, loop. Exits when the shutdown token fires between
    /// tasks or the queue closes. An in-flight task is never interrupted
    /// here; its own timeout bounds the drain.
    pub(super) async fn run(
        self,
        queue: Arc<tokio::sync::Mutex<Receiver<Task>>>,
        shutdown: CancellationToken,
    ) {
        tracing::debug!(slot = self.slot, "worker started");
        loop {
            let task = tokio::select! {
                // Shutdown first: no new task starts after the signal.
                biased;
                () = shutdown.cancelled() => break,
                task = dequeue(&queue) => match task {
                    Some(task) => task,
                    None => break,
                },
            };
            self.process(task).await;
        }
        tracing::debug!(slot = self.slot, "worker stopped");
    }

    async fn process(&self, task: Task) {
        let task_id = task.id;
        tracing::info!(
            slot = self.slot,
            task_id,
            kind = %task.kind,
            priority = %task.priority,
            "processing task"
        );

        // A failed start report abandons the task with no terminal state;
        // the control plane's server-side timeout reclaims it.
        if let Err(error) = self.client.mark_started(task_id).await {
            tracing::warn!(slot = self.slot, task_id, %error, "start report failed, abandoning task");
            return;
        }

        let started = Instant::now();
        let timeout = task.timeout();
        let cancel = CancellationToken::new();

        // Deadline: cancel the task token when the budget runs out. The
        // subprocess engine sees the token and kills the process group.
        let watchdog = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            })
        };

        // Cancellation channel: watch for a control-plane should_cancel.
        let watcher = {
            let cancel = cancel.clone();
            let client = self.client.clone();
            let interval = self.config.poll_interval();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(interval) => {}
                    }
                    match client.task_status(task_id).await {
                        Ok(status) if status.should_cancel => {
                            tracing::info!(task_id, "control plane requested cancellation");
                            cancel.cancel();
                            break;
                        }
                        Ok(_) => {}
                        Err(error) => {
                            tracing::debug!(task_id, %error, "task status check failed");
                        }
                    }
                }
            })
        };

        let ctx = TaskCtx {
            client: self.client.clone(),
            config: self.config.clone(),
            sink: Arc::new(ProgressSink::new(
                self.client.clone(),
                task_id,
                self.clock.clone(),
            )),
        };

        let result = handlers::dispatch(&ctx, &task, &cancel).await;

        watchdog.abort();
        watcher.abort();

        // A cancellation triggered by the deadline is a timeout.
        let result = match result {
            Err(TaskError::Cancelled) if started.elapsed() >= timeout => Err(TaskError::Timeout),
            other => other,
        };

        match result {
            Ok(outcome) => {
                tracing::info!(
                    slot = self.slot,
                    task_id,
                    elapsed = %format_elapsed(started.elapsed()),
                    "task completed"
                );
                let request = CompleteRequest {
                    exit_code: outcome.exit_code,
                    result: outcome.result,
                };
                if let Err(error) = self.client.complete(task_id, &request).await {
                    // Logged only; the task is not reattempted.
                    tracing::warn!(slot = self.slot, task_id, %error, "completion report failed");
                }
            }
            Err(error) => {
                let exit_code = error.exit_code();
                tracing::warn!(
                    slot = self.slot,
                    task_id,
                    %error,
                    exit_code,
                    elapsed = %format_elapsed(started.elapsed()),
                    "task failed"
                );
                let request = FailRequest {
                    error: error.to_string(),
                    exit_code,
                };
                if let Err(report_error) = self.client.fail(task_id, &request).await {
                    tracing::warn!(slot = self.slot, task_id, %report_error, "failure report failed");
                }
            }
        }
    }
}

async fn dequeue(queue: &Arc<tokio::sync::Mutex<Receiver<Task>>>) -> Option<Task> {
    queue.lock().await.recv().await
}
