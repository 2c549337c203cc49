// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background sweep that claims and executes due scheduled tasks.
//!
//! Each poll claims a batch atomically (no double-claims under
//! concurrent sweepers) and runs the executor per task. A task is
//! marked completed only after its executor returns `Ok`; failed tasks
//! stay claimed and are re-offered once the stale-claim cutoff passes.
//! Delivery is therefore at-least-once and executors must be idempotent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use switchboard_core::types::ScheduledTask;
use switchboard_core::{StateStore, SwitchboardError};

/// Tasks claimed per poll.
const CLAIM_BATCH: usize = 16;

/// Executes claimed tasks. Implementations must be idempotent.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: ScheduledTask) -> Result<(), SwitchboardError>;
}

/// Periodic sweep over the scheduled task queue.
pub struct TaskSweeper {
    store: Arc<dyn StateStore>,
    executor: Arc<dyn TaskExecutor>,
    poll_interval: Duration,
}

impl TaskSweeper {
    pub fn new(
        store: Arc<dyn StateStore>,
        executor: Arc<dyn TaskExecutor>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            executor,
            poll_interval,
        }
    }

    /// Run until `cancel` fires. One final sweep is not attempted on
    /// cancellation; claimed-but-unfinished tasks are re-offered later.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("task sweeper stopping");
                    return;
                }
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }
    }

    /// Claim and execute one batch of due tasks.
    pub async fn sweep_once(&self) {
        let tasks = match self.store.claim_due_tasks(CLAIM_BATCH).await {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(error = %err, "task claim failed, will retry next poll");
                return;
            }
        };

        for task in tasks {
            let task_id = task.id.clone();
            let kind = task.kind.clone();
            match self.executor.execute(task).await {
                Ok(()) => {
                    if let Err(err) = self.store.complete_task(&task_id).await {
                        // Completion write failed: the task will be re-offered
                        // and the idempotent executor absorbs the replay.
                        warn!(task_id, error = %err, "failed to mark task completed");
                    }
                }
                Err(err) => {
                    warn!(task_id, kind, error = %err, "task execution failed");
                }
            }
        }
    }
}
