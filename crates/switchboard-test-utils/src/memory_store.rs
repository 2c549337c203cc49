// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`StateStore`] for tests, with scripted write failures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use switchboard_core::types::{ScheduledTask, TaskStatus};
use switchboard_core::{StateStore, SwitchboardError};

#[derive(Clone)]
struct Expiring {
    value: serde_json::Value,
    expires_at: DateTime<Utc>,
}

struct TaskRow {
    task: ScheduledTask,
    claimed: bool,
}

/// In-memory state store. Set [`fail_writes`](Self::set_fail_writes)
/// to make every mutation return a persistence error, for testing the
/// degraded paths (rate-limiter fail-open, aborted control transitions).
#[derive(Default)]
pub struct MemoryStore {
    kv: Mutex<HashMap<String, Expiring>>,
    lists: Mutex<HashMap<String, Vec<Expiring>>>,
    tasks: Mutex<Vec<TaskRow>>,
    windows: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every mutation fails with a persistence error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// When set, every read fails with a persistence error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), SwitchboardError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(SwitchboardError::Persistence {
                source: "scripted write failure".into(),
            })
        } else {
            Ok(())
        }
    }

    fn check_read(&self) -> Result<(), SwitchboardError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(SwitchboardError::Persistence {
                source: "scripted read failure".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn set_with_expiry(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), SwitchboardError> {
        self.check_write()?;
        self.kv.lock().unwrap().insert(
            key.to_string(),
            Expiring {
                value,
                expires_at: Utc::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, SwitchboardError> {
        self.check_read()?;
        let mut kv = self.kv.lock().unwrap();
        match kv.get(key) {
            Some(entry) if entry.expires_at <= Utc::now() => {
                kv.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), SwitchboardError> {
        self.check_write()?;
        self.kv.lock().unwrap().remove(key);
        Ok(())
    }

    async fn append_to_list(
        &self,
        key: &str,
        entry: serde_json::Value,
        cap: usize,
        ttl: Duration,
    ) -> Result<(), SwitchboardError> {
        self.check_write()?;
        let mut lists = self.lists.lock().unwrap();
        let list = lists.entry(key.to_string()).or_default();
        list.push(Expiring {
            value: entry,
            expires_at: Utc::now() + ttl,
        });
        if list.len() > cap {
            let excess = list.len() - cap;
            list.drain(..excess);
        }
        Ok(())
    }

    async fn get_list(&self, key: &str) -> Result<Vec<serde_json::Value>, SwitchboardError> {
        self.check_read()?;
        let now = Utc::now();
        Ok(self
            .lists
            .lock()
            .unwrap()
            .get(key)
            .map(|list| {
                list.iter()
                    .filter(|e| e.expires_at > now)
                    .map(|e| e.value.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn schedule_task(
        &self,
        kind: &str,
        payload: serde_json::Value,
        delay: Duration,
    ) -> Result<String, SwitchboardError> {
        self.check_write()?;
        let id = uuid::Uuid::new_v4().to_string();
        self.tasks.lock().unwrap().push(TaskRow {
            task: ScheduledTask {
                id: id.clone(),
                kind: kind.to_string(),
                payload,
                scheduled_for: Utc::now() + delay,
                status: TaskStatus::Pending,
            },
            claimed: false,
        });
        Ok(id)
    }

    async fn claim_due_tasks(&self, limit: usize) -> Result<Vec<ScheduledTask>, SwitchboardError> {
        self.check_write()?;
        let now = Utc::now();
        let mut tasks = self.tasks.lock().unwrap();
        let mut claimed = Vec::new();
        for row in tasks.iter_mut() {
            if claimed.len() >= limit {
                break;
            }
            if !row.claimed
                && row.task.status == TaskStatus::Pending
                && row.task.scheduled_for <= now
            {
                row.claimed = true;
                claimed.push(row.task.clone());
            }
        }
        Ok(claimed)
    }

    async fn complete_task(&self, task_id: &str) -> Result<(), SwitchboardError> {
        self.check_write()?;
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(row) = tasks.iter_mut().find(|r| r.task.id == task_id) {
            row.task.status = TaskStatus::Completed;
        }
        Ok(())
    }

    async fn increment_windowed(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<u64, SwitchboardError> {
        self.check_write()?;
        let now = Utc::now();
        let cutoff = now - window;
        let mut windows = self.windows.lock().unwrap();
        let hits = windows.entry(key.to_string()).or_default();
        hits.retain(|t| *t > cutoff);
        hits.push(now);
        Ok(hits.len() as u64)
    }
}
