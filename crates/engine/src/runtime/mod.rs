// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task runtime: polling supervisor, bounded queue, fixed worker pool.
//!
//! The supervisor is the queue's only producer. Enqueueing never blocks:
//! when the queue is full the task is dropped locally without an ack, and
//! the control plane re-offers it on a later poll. Together with the fixed
//! pool this caps in-flight work at `max_concurrent_tasks + QUEUE_CAPACITY`.

mod worker;

use std::sync::Arc;

use pba_adapters::{ApiClient, ApiError};
use pba_core::{Clock, Config, SystemClock, Task};
use pba_wire::HeartbeatRequest;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use worker::Worker;

/// Bounded task queue capacity.
pub const QUEUE_CAPACITY: usize = 10;

/// The agent's main loop: two tickers (poll, heartbeat) feeding N workers
/// through a bounded queue.
pub struct Runtime<C: Clock = SystemClock> {
    client: Arc<ApiClient>,
    config: Arc<Config>,
    clock: C,
}

impl Runtime<SystemClock> {
    pub fn new(client: Arc<ApiClient>, config: Arc<Config>) -> Self {
        Self::with_clock(client, config, SystemClock)
    }
}

impl<C: Clock> Runtime<C> {
    pub fn with_clock(client: Arc<ApiClient>, config: Arc<Config>, clock: C) -> Self {
        Self {
            client,
            config,
            clock,
        }
    }

    /// Run until `shutdown` fires. Workers drain their in-flight task
    /// (bounded by its timeout) before this returns.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            poll_interval = ?self.config.poll_interval(),
            heartbeat_interval = ?self.config.heartbeat_interval(),
            workers = self.config.agent.max_concurrent_tasks,
            "agent started, polling for tasks"
        );

        // Priming heartbeat: announce ourselves before the first tick.
        match self.send_heartbeat().await {
            Ok(()) => tracing::info!("connected to control plane"),
            Err(error) => {
                tracing::warn!(%error, "initial heartbeat failed (server may be unreachable)");
            }
        }

        let (queue_tx, queue_rx) = mpsc::channel::<Task>(QUEUE_CAPACITY);
        let queue_rx = Arc::new(tokio::sync::Mutex::new(queue_rx));

        let worker_count = self.config.agent.max_concurrent_tasks.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for slot in 0..worker_count {
            let worker = Worker::new(
                slot,
                self.client.clone(),
                self.config.clone(),
                self.clock.clone(),
            );
            let queue = queue_rx.clone();
            let shutdown = shutdown.clone();
            workers.push(tokio::spawn(async move {
                worker.run(queue, shutdown).await;
            }));
        }

        let mut poll = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.poll_interval(),
            self.config.poll_interval(),
        );
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut heartbeat = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.heartbeat_interval(),
            self.config.heartbeat_interval(),
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    tracing::info!("shutting down task loop");
                    break;
                }
                _ = poll.tick() => {
                    self.poll_tasks(&queue_tx).await;
                }
                _ = heartbeat.tick() => {
                    if let Err(error) = self.send_heartbeat().await {
                        tracing::warn!(%error, "heartbeat failed");
                    }
                }
            }
        }

        // Closing the queue lets idle workers exit; busy ones finish their
        // current task first.
        drop(queue_tx);
        for handle in workers {
            let _ = handle.await;
        }
        tracing::info!("all workers stopped");
    }

    async fn poll_tasks(&self, queue: &mpsc::Sender<Task>) {
        let page = match self.client.fetch_tasks().await {
            Ok(page) => page,
            Err(error) => {
                tracing::warn!(%error, "task poll failed");
                return;
            }
        };
        if page.tasks.is_empty() {
            return;
        }

        tracing::debug!(count = page.tasks.len(), "received tasks");
        for task in page.tasks {
            let task_id = task.id;
            let kind = task.kind;
            match queue.try_send(task) {
                Ok(()) => tracing::debug!(task_id, %kind, "queued task"),
                Err(TrySendError::Full(_)) => {
                    // No ack: the control plane re-offers on the next poll.
                    tracing::warn!(task_id, %kind, "queue full, dropping task");
                }
                Err(TrySendError::Closed(_)) => return,
            }
        }
    }

    async fn send_heartbeat(&self) -> Result<(), ApiError> {
        let capabilities = pba_probe::detect_capabilities().await;
        let os_info = pba_probe::os_info().await;

        let request = HeartbeatRequest {
            version: self.config.agent.version.clone(),
            capabilities: serde_json::Value::Object(capabilities),
            os_info,
        };
        self.client.heartbeat(&request).await?;
        tracing::debug!("heartbeat sent");
        Ok(())
    }
}
