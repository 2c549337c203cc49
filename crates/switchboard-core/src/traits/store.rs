// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! State store trait: keyed storage with per-key expiry, capped
//! append-only lists, a time-ordered task queue, and windowed counters.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::types::ScheduledTask;

/// Keyed storage with expiry, used by every other component.
///
/// Write failures after internal retry exhaustion surface as
/// [`SwitchboardError::Persistence`]; callers decide whether to
/// proceed degraded (broadcast/log paths) or abort (control-state
/// transitions).
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Store `value` under `key`, replacing any prior value, expiring
    /// after `ttl`.
    async fn set_with_expiry(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), SwitchboardError>;

    /// Read `key`. Expired keys read as absent.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, SwitchboardError>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), SwitchboardError>;

    /// Append `entry` to the list at `key`, trimming the oldest entries
    /// beyond `cap` and refreshing the list's expiry to `ttl`.
    async fn append_to_list(
        &self,
        key: &str,
        entry: serde_json::Value,
        cap: usize,
        ttl: Duration,
    ) -> Result<(), SwitchboardError>;

    /// Read the list at `key`, oldest first.
    async fn get_list(&self, key: &str) -> Result<Vec<serde_json::Value>, SwitchboardError>;

    /// Enqueue a deferred task due after `delay`. Returns the task id.
    async fn schedule_task(
        &self,
        kind: &str,
        payload: serde_json::Value,
        delay: Duration,
    ) -> Result<String, SwitchboardError>;

    /// Atomically claim up to `limit` due tasks. A task claimed by one
    /// sweeper is never returned to a concurrent sweeper.
    async fn claim_due_tasks(&self, limit: usize) -> Result<Vec<ScheduledTask>, SwitchboardError>;

    /// Mark a claimed task completed. Idempotent.
    async fn complete_task(&self, task_id: &str) -> Result<(), SwitchboardError>;

    /// Record a hit against the sliding window at `key` and return the
    /// number of hits inside the window (including this one).
    async fn increment_windowed(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<u64, SwitchboardError>;
}
