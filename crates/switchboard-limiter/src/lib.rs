// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sliding-window rate limiting for outbound subject contact.
//!
//! Hits live in the state store, so limits hold across restarts. The
//! limiter fails OPEN: when the store cannot answer, the action is
//! allowed and the failure is logged, because blocking live customer
//! conversations on a store hiccup is the worse outcome.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use switchboard_config::model::LimitsConfig;
use switchboard_core::types::{RateDecision, TenantId};
use switchboard_core::StateStore;

/// Sliding-window limiter over the store's windowed counters.
///
/// Denied attempts still count as hits: a caller hammering a closed
/// window keeps it closed.
pub struct RateLimiter {
    store: Arc<dyn StateStore>,
    limits: LimitsConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn StateStore>, limits: LimitsConfig) -> Self {
        Self { store, limits }
    }

    /// May `tenant_id` send one more outbound message to `subject_id`?
    ///
    /// Windows are keyed per tenant as well as per subject: two tenants
    /// contacting the same phone number never share a quota.
    pub async fn allow_message(&self, tenant_id: &TenantId, subject_id: &str) -> RateDecision {
        self.check(
            &format!("msg:{tenant_id}:{subject_id}"),
            self.limits.messages_per_window,
            Duration::from_secs(self.limits.message_window_secs),
        )
        .await
    }

    /// May `tenant_id` place one more outbound call to `subject_id`?
    pub async fn allow_call(&self, tenant_id: &TenantId, subject_id: &str) -> RateDecision {
        self.check(
            &format!("call:{tenant_id}:{subject_id}"),
            self.limits.calls_per_window,
            Duration::from_secs(self.limits.call_window_secs),
        )
        .await
    }

    /// Record a hit and decide. `reset_at` is the latest time the
    /// window can possibly reopen; the store prunes hits lazily, so
    /// it often reopens sooner.
    pub async fn check(&self, key: &str, limit: u64, window: Duration) -> RateDecision {
        match self.store.increment_windowed(key, window).await {
            Ok(hits) => RateDecision {
                allowed: hits <= limit,
                remaining: limit.saturating_sub(hits),
                reset_at: Utc::now() + window,
            },
            Err(err) => {
                warn!(key, error = %err, "rate-limit check failed, allowing");
                RateDecision {
                    allowed: true,
                    remaining: 0,
                    reset_at: Utc::now() + window,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_test_utils::MemoryStore;

    fn limiter(store: Arc<MemoryStore>) -> RateLimiter {
        RateLimiter::new(
            store,
            LimitsConfig {
                messages_per_window: 3,
                message_window_secs: 3600,
                calls_per_window: 1,
                call_window_secs: 3600,
            },
        )
    }

    fn tenant(name: &str) -> TenantId {
        TenantId(name.into())
    }

    #[tokio::test]
    async fn blocks_after_limit_within_window() {
        let limiter = limiter(Arc::new(MemoryStore::new()));
        for i in 0..3 {
            let decision = limiter.allow_message(&tenant("t1"), "+1555").await;
            assert!(decision.allowed, "message {i} should pass");
        }
        let decision = limiter.allow_message(&tenant("t1"), "+1555").await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.reset_at > Utc::now());
    }

    #[tokio::test]
    async fn subjects_have_independent_windows() {
        let limiter = limiter(Arc::new(MemoryStore::new()));
        assert!(limiter.allow_call(&tenant("t1"), "+1555").await.allowed);
        // +1555 is exhausted; +1666 is untouched.
        assert!(!limiter.allow_call(&tenant("t1"), "+1555").await.allowed);
        assert!(limiter.allow_call(&tenant("t1"), "+1666").await.allowed);
    }

    #[tokio::test]
    async fn tenants_do_not_share_a_subject_window() {
        let limiter = limiter(Arc::new(MemoryStore::new()));
        for _ in 0..3 {
            assert!(
                limiter
                    .allow_message(&tenant("tenant-a"), "+15551234567")
                    .await
                    .allowed
            );
        }
        assert!(
            !limiter
                .allow_message(&tenant("tenant-a"), "+15551234567")
                .await
                .allowed,
            "tenant-a exhausted its own window"
        );
        // Same subject number, different tenant: a fresh window.
        assert!(
            limiter
                .allow_message(&tenant("tenant-b"), "+15551234567")
                .await
                .allowed,
            "tenant-b must not inherit tenant-a's exhausted window"
        );
    }

    #[tokio::test]
    async fn messages_and_calls_do_not_share_a_window() {
        let limiter = limiter(Arc::new(MemoryStore::new()));
        assert!(limiter.allow_call(&tenant("t1"), "+1555").await.allowed);
        assert!(!limiter.allow_call(&tenant("t1"), "+1555").await.allowed);
        assert!(limiter.allow_message(&tenant("t1"), "+1555").await.allowed);
    }

    #[tokio::test]
    async fn fails_open_when_store_is_down() {
        let store = Arc::new(MemoryStore::new());
        let limiter = limiter(store.clone());
        store.set_fail_writes(true);

        let decision = limiter.allow_message(&tenant("t1"), "+1555").await;
        assert!(decision.allowed, "store failure must not block sends");
    }
}
