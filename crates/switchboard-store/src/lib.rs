// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`StateStore`] trait.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread and wrapped in the shared [`RetryPolicy`], so transient
//! failures are absorbed here and only retry-exhausted failures surface
//! as [`SwitchboardError::Persistence`].

pub mod database;
pub mod queries;
pub mod sweeper;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use switchboard_config::model::StoreConfig;
use switchboard_core::types::ScheduledTask;
use switchboard_core::{RetryPolicy, StateStore, SwitchboardError};

pub use database::Database;
pub use sweeper::{TaskExecutor, TaskSweeper};

/// SQLite-backed state store.
pub struct SqliteStore {
    db: Database,
    retry: RetryPolicy,
}

impl SqliteStore {
    /// Open the store at the configured path, applying schema.
    pub async fn open(config: &StoreConfig) -> Result<Self, SwitchboardError> {
        let db = Database::open(&config.database_path).await?;
        debug!(path = %config.database_path, "SQLite state store initialized");
        Ok(Self {
            db,
            retry: Self::retry_policy(config),
        })
    }

    /// Open an in-memory store. Used by tests.
    pub async fn open_in_memory(config: &StoreConfig) -> Result<Self, SwitchboardError> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db,
            retry: Self::retry_policy(config),
        })
    }

    fn retry_policy(config: &StoreConfig) -> RetryPolicy {
        RetryPolicy {
            max_attempts: config.write_retry_attempts,
            ..RetryPolicy::store_writes()
        }
    }

    /// Flush the WAL and close out pending writes.
    pub async fn close(&self) -> Result<(), SwitchboardError> {
        self.db.close().await
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn set_with_expiry(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), SwitchboardError> {
        let ttl_millis = ttl.as_millis() as i64;
        self.retry
            .run("kv.set", || {
                let db = self.db.clone();
                let key = key.to_string();
                let value = value.clone();
                async move { queries::kv::set(&db, &key, &value, ttl_millis).await }
            })
            .await
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, SwitchboardError> {
        queries::kv::get(&self.db, key).await
    }

    async fn delete(&self, key: &str) -> Result<(), SwitchboardError> {
        self.retry
            .run("kv.delete", || {
                let db = self.db.clone();
                let key = key.to_string();
                async move { queries::kv::delete(&db, &key).await }
            })
            .await
    }

    async fn append_to_list(
        &self,
        key: &str,
        entry: serde_json::Value,
        cap: usize,
        ttl: Duration,
    ) -> Result<(), SwitchboardError> {
        let ttl_millis = ttl.as_millis() as i64;
        self.retry
            .run("list.append", || {
                let db = self.db.clone();
                let key = key.to_string();
                let entry = entry.clone();
                async move { queries::lists::append(&db, &key, &entry, cap, ttl_millis).await }
            })
            .await
    }

    async fn get_list(&self, key: &str) -> Result<Vec<serde_json::Value>, SwitchboardError> {
        queries::lists::get(&self.db, key).await
    }

    async fn schedule_task(
        &self,
        kind: &str,
        payload: serde_json::Value,
        delay: Duration,
    ) -> Result<String, SwitchboardError> {
        let delay_millis = delay.as_millis() as i64;
        self.retry
            .run("tasks.schedule", || {
                let db = self.db.clone();
                let kind = kind.to_string();
                let payload = payload.clone();
                async move { queries::tasks::schedule(&db, &kind, &payload, delay_millis).await }
            })
            .await
    }

    async fn claim_due_tasks(&self, limit: usize) -> Result<Vec<ScheduledTask>, SwitchboardError> {
        queries::tasks::claim_due(&self.db, limit).await
    }

    async fn complete_task(&self, task_id: &str) -> Result<(), SwitchboardError> {
        self.retry
            .run("tasks.complete", || {
                let db = self.db.clone();
                let task_id = task_id.to_string();
                async move { queries::tasks::complete(&db, &task_id).await }
            })
            .await
    }

    async fn increment_windowed(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<u64, SwitchboardError> {
        let window_millis = window.as_millis() as i64;
        self.retry
            .run("windows.increment", || {
                let db = self.db.clone();
                let key = key.to_string();
                async move { queries::windows::increment(&db, &key, window_millis).await }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteStore {
        SqliteStore::open_in_memory(&StoreConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn set_and_get_round_trip() {
        let store = store().await;
        let value = serde_json::json!({"subject": "+15551234567"});
        store
            .set_with_expiry("session:s1", value.clone(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("session:s1").await.unwrap(), Some(value));
    }

    #[tokio::test]
    async fn expired_keys_read_as_absent() {
        let store = store().await;
        store
            .set_with_expiry("gone", serde_json::json!(1), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(store.get("gone").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = store().await;
        store.delete("never-existed").await.unwrap();
        store
            .set_with_expiry("k", serde_json::json!(true), Duration::from_secs(60))
            .await
            .unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_append_respects_cap() {
        let store = store().await;
        for i in 0..10 {
            store
                .append_to_list(
                    "events:s1",
                    serde_json::json!({"n": i}),
                    5,
                    Duration::from_secs(60),
                )
                .await
                .unwrap();
        }
        let list = store.get_list("events:s1").await.unwrap();
        assert_eq!(list.len(), 5);
        // Newest five survive, oldest first.
        assert_eq!(list[0]["n"], 5);
        assert_eq!(list[4]["n"], 9);
    }

    #[tokio::test]
    async fn concurrent_claims_never_overlap() {
        let store = std::sync::Arc::new(store().await);
        for _ in 0..20 {
            store
                .schedule_task("t", serde_json::json!({}), Duration::ZERO)
                .await
                .unwrap();
        }

        let (a, b) = tokio::join!(store.claim_due_tasks(20), store.claim_due_tasks(20));
        let a = a.unwrap();
        let b = b.unwrap();
        assert_eq!(a.len() + b.len(), 20);
        for task in &a {
            assert!(!b.iter().any(|t| t.id == task.id), "task claimed twice");
        }
    }

    #[tokio::test]
    async fn windowed_counter_counts_inside_window() {
        let store = store().await;
        for expected in 1..=3u64 {
            let count = store
                .increment_windowed("t1:+1555:message", Duration::from_secs(60))
                .await
                .unwrap();
            assert_eq!(count, expected);
        }
    }
}
