// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Executors for deferred work claimed by the store's task sweeper.
//!
//! Task delivery is at-least-once; everything here must tolerate
//! replay. A send that already went out is absorbed by the rate
//! limiter's window rather than duplicated indefinitely.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use switchboard_core::types::{ScheduledTask, TenantId};
use switchboard_core::{SubjectTransport, SwitchboardError};
use switchboard_limiter::RateLimiter;
use switchboard_store::TaskExecutor;

/// Task kind for a deferred outbound message to a subject.
pub const KIND_SEND_MESSAGE: &str = "send_message";

/// Executes deferred subject deliveries.
///
/// Payload shape for [`KIND_SEND_MESSAGE`]:
/// `{"tenant_id": "...", "subject_id": "...", "message": "..."}`.
/// The tenant scopes the rate-limit window the send is charged to.
pub struct DeliveryExecutor {
    transport: Arc<dyn SubjectTransport>,
    limiter: Arc<RateLimiter>,
}

impl DeliveryExecutor {
    pub fn new(transport: Arc<dyn SubjectTransport>, limiter: Arc<RateLimiter>) -> Self {
        Self { transport, limiter }
    }

    async fn send_message(&self, task: &ScheduledTask) -> Result<(), SwitchboardError> {
        let tenant_id = task
            .payload
            .get("tenant_id")
            .and_then(|v| v.as_str())
            .map(|t| TenantId(t.to_string()))
            .ok_or_else(|| {
                SwitchboardError::Internal(format!("task {} has no tenant_id", task.id))
            })?;
        let subject_id = task
            .payload
            .get("subject_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                SwitchboardError::Internal(format!("task {} has no subject_id", task.id))
            })?;
        let message = task
            .payload
            .get("message")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                SwitchboardError::Internal(format!("task {} has no message", task.id))
            })?;

        let decision = self.limiter.allow_message(&tenant_id, subject_id).await;
        if !decision.allowed {
            // Leave the task claimed; the stale-claim cutoff re-offers
            // it once the window has had time to reopen.
            return Err(SwitchboardError::RateLimitExceeded {
                reset_at: decision.reset_at,
            });
        }

        let receipt = self.transport.send_message(subject_id, message).await?;
        info!(
            task_id = %task.id,
            delivery_id = %receipt.delivery_id,
            "deferred message delivered"
        );
        Ok(())
    }
}

#[async_trait]
impl TaskExecutor for DeliveryExecutor {
    async fn execute(&self, task: ScheduledTask) -> Result<(), SwitchboardError> {
        match task.kind.as_str() {
            KIND_SEND_MESSAGE => self.send_message(&task).await,
            other => {
                // Unknown kinds complete rather than clog the queue.
                warn!(task_id = %task.id, kind = other, "unknown task kind, discarding");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use switchboard_config::model::LimitsConfig;
    use switchboard_core::types::TaskStatus;
    use switchboard_test_utils::{MemoryStore, MockTransport};

    fn task(kind: &str, payload: serde_json::Value) -> ScheduledTask {
        ScheduledTask {
            id: "task-1".into(),
            kind: kind.into(),
            payload,
            scheduled_for: Utc::now(),
            status: TaskStatus::Pending,
        }
    }

    fn executor(transport: Arc<MockTransport>) -> DeliveryExecutor {
        let limiter = Arc::new(RateLimiter::new(
            Arc::new(MemoryStore::new()),
            LimitsConfig {
                messages_per_window: 1,
                message_window_secs: 3600,
                calls_per_window: 1,
                call_window_secs: 3600,
            },
        ));
        DeliveryExecutor::new(transport, limiter)
    }

    #[tokio::test]
    async fn delivers_scheduled_message() {
        let transport = Arc::new(MockTransport::new());
        let exec = executor(transport.clone());
        exec.execute(task(
            KIND_SEND_MESSAGE,
            serde_json::json!({
                "tenant_id": "tenant-a",
                "subject_id": "+1555",
                "message": "reminder",
            }),
        ))
        .await
        .unwrap();
        assert_eq!(transport.sent()[0].body, "reminder");
    }

    #[tokio::test]
    async fn rate_limited_delivery_stays_pending() {
        let transport = Arc::new(MockTransport::new());
        let exec = executor(transport.clone());
        let payload = serde_json::json!({
            "tenant_id": "tenant-a",
            "subject_id": "+1555",
            "message": "again",
        });

        exec.execute(task(KIND_SEND_MESSAGE, payload.clone()))
            .await
            .unwrap();
        let err = exec
            .execute(task(KIND_SEND_MESSAGE, payload))
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::RateLimitExceeded { .. }));
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn malformed_payload_is_an_error() {
        let exec = executor(Arc::new(MockTransport::new()));
        let err = exec
            .execute(task(KIND_SEND_MESSAGE, serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::Internal(_)));
    }

    #[tokio::test]
    async fn unknown_kind_completes() {
        let exec = executor(Arc::new(MockTransport::new()));
        exec.execute(task("mystery", serde_json::json!({})))
            .await
            .unwrap();
    }
}
