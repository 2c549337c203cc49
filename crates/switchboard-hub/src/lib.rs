// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fan-out of session events to dashboard observers.
//!
//! The hub owns an arena-style registry of observer connections keyed
//! by session, each tagged with the tenant it was authenticated for.
//! Publishing checks the tenant tag per observer: any mismatch is
//! dropped and logged as a security event, never delivered, even when
//! caller error would otherwise leak it.
//!
//! Delivery is non-blocking. Each observer has a bounded buffer and a
//! full or closed buffer counts as a dead observer, pruned on that
//! publish attempt rather than eagerly polled. A periodic liveness
//! message detects half-open connections.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use switchboard_core::types::{ObserverId, SessionEvent, SessionId, TenantId};

/// What an observer connection receives.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObserverMessage {
    /// A session event scoped to the observer's tenant.
    Event(SessionEvent),
    /// Periodic liveness probe.
    Liveness { at: DateTime<Utc> },
}

struct Observer {
    id: ObserverId,
    tenant_id: TenantId,
    tx: mpsc::Sender<ObserverMessage>,
}

/// Tenant-isolated observer fan-out.
pub struct BroadcastHub {
    observers: DashMap<SessionId, Vec<Observer>>,
    observer_buffer: usize,
    liveness_interval: Duration,
}

impl BroadcastHub {
    pub fn new(observer_buffer: usize, liveness_interval: Duration) -> Self {
        Self {
            observers: DashMap::new(),
            observer_buffer,
            liveness_interval,
        }
    }

    /// Register an observer for `session_id`, tagged with the tenant it
    /// authenticated for. Returns the observer id and its receive side.
    pub fn subscribe(
        &self,
        session_id: &SessionId,
        tenant_id: TenantId,
    ) -> (ObserverId, mpsc::Receiver<ObserverMessage>) {
        let (tx, rx) = mpsc::channel(self.observer_buffer);
        let id = ObserverId::generate();
        self.observers
            .entry(session_id.clone())
            .or_default()
            .push(Observer {
                id: id.clone(),
                tenant_id,
                tx,
            });
        debug!(%session_id, observer_id = %id, "observer subscribed");
        (id, rx)
    }

    /// Remove one observer. Removing an unknown observer is a no-op.
    pub fn unsubscribe(&self, session_id: &SessionId, observer_id: &ObserverId) {
        if let Some(mut entry) = self.observers.get_mut(session_id) {
            entry.retain(|o| o.id != *observer_id);
        }
        self.observers
            .remove_if(session_id, |_, observers| observers.is_empty());
    }

    /// Drop every observer of a session (conversation teardown).
    pub fn unsubscribe_session(&self, session_id: &SessionId) {
        if self.observers.remove(session_id).is_some() {
            debug!(%session_id, "all observers unsubscribed");
        }
    }

    /// Deliver `event` to every live observer of its session whose
    /// tenant tag matches the event's tenant. Dead observers are pruned
    /// here; delivery to one observer never waits on another.
    pub fn publish(&self, event: &SessionEvent) {
        let Some(mut entry) = self.observers.get_mut(&event.session_id) else {
            return;
        };

        entry.retain(|observer| {
            if observer.tenant_id != event.tenant_id {
                warn!(
                    security = true,
                    session_id = %event.session_id,
                    observer_id = %observer.id,
                    observer_tenant = %observer.tenant_id,
                    event_tenant = %event.tenant_id,
                    "cross-tenant event delivery blocked"
                );
                // Blocked, not dead: the observer stays subscribed for
                // events of its own tenant.
                return true;
            }
            match observer.tx.try_send(ObserverMessage::Event(event.clone())) {
                Ok(()) => true,
                Err(err) => {
                    debug!(
                        session_id = %event.session_id,
                        observer_id = %observer.id,
                        error = %err,
                        "pruning dead observer"
                    );
                    false
                }
            }
        });

        let session_id = event.session_id.clone();
        drop(entry);
        self.observers
            .remove_if(&session_id, |_, observers| observers.is_empty());
    }

    /// Observers currently registered for `session_id`.
    pub fn observer_count(&self, session_id: &SessionId) -> usize {
        self.observers
            .get(session_id)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }

    /// Periodic liveness probe to every observer until `cancel` fires.
    /// Half-open connections fail the probe and are pruned.
    pub async fn run_liveness(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.liveness_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("liveness probe stopping");
                    return;
                }
                _ = ticker.tick() => self.probe_once(),
            }
        }
    }

    /// One liveness pass over every observer.
    pub fn probe_once(&self) {
        let at = Utc::now();
        let mut empty_sessions = Vec::new();
        for mut entry in self.observers.iter_mut() {
            entry
                .value_mut()
                .retain(|observer| {
                    observer
                        .tx
                        .try_send(ObserverMessage::Liveness { at })
                        .is_ok()
                });
            if entry.value().is_empty() {
                empty_sessions.push(entry.key().clone());
            }
        }
        for session_id in empty_sessions {
            self.observers
                .remove_if(&session_id, |_, observers| observers.is_empty());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::types::EventKind;

    fn event(session: &str, tenant: &str) -> SessionEvent {
        SessionEvent::new(
            EventKind::AgentResponse,
            SessionId(session.into()),
            TenantId(tenant.into()),
            serde_json::json!({"text": "hi"}),
        )
    }

    fn hub() -> BroadcastHub {
        BroadcastHub::new(8, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn events_reach_matching_tenant_only() {
        let hub = hub();
        let session = SessionId("s1".into());
        let (_id_a, mut rx_a) = hub.subscribe(&session, TenantId("tenant-a".into()));
        let (_id_b, mut rx_b) = hub.subscribe(&session, TenantId("tenant-b".into()));

        hub.publish(&event("s1", "tenant-a"));

        match rx_a.try_recv().unwrap() {
            ObserverMessage::Event(e) => assert_eq!(e.tenant_id.0, "tenant-a"),
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(rx_b.try_recv().is_err(), "tenant-b observer must see nothing");
        // The mismatched observer is blocked, not pruned.
        assert_eq!(hub.observer_count(&session), 2);
    }

    #[tokio::test]
    async fn dead_observers_are_pruned_on_publish() {
        let hub = hub();
        let session = SessionId("s1".into());
        let (_id, rx) = hub.subscribe(&session, TenantId("t".into()));
        drop(rx);

        hub.publish(&event("s1", "t"));
        assert_eq!(hub.observer_count(&session), 0);
    }

    #[tokio::test]
    async fn slow_observer_does_not_block_others() {
        let hub = BroadcastHub::new(1, Duration::from_secs(30));
        let session = SessionId("s1".into());
        let (_slow, _rx_slow_kept_full) = {
            let (id, rx) = hub.subscribe(&session, TenantId("t".into()));
            // Fill the slow observer's buffer without draining it.
            hub.publish(&event("s1", "t"));
            (id, rx)
        };
        let (_fast, mut rx_fast) = hub.subscribe(&session, TenantId("t".into()));

        // The slow observer's buffer is full and it gets pruned; the
        // fast observer still receives the event immediately.
        hub.publish(&event("s1", "t"));
        assert!(matches!(
            rx_fast.try_recv().unwrap(),
            ObserverMessage::Event(_)
        ));
        assert_eq!(hub.observer_count(&session), 1);
    }

    #[tokio::test]
    async fn liveness_probe_prunes_half_open_connections() {
        let hub = hub();
        let session = SessionId("s1".into());
        let (_gone, rx) = hub.subscribe(&session, TenantId("t".into()));
        let (_live, mut rx_live) = hub.subscribe(&session, TenantId("t".into()));
        drop(rx);

        hub.probe_once();
        assert_eq!(hub.observer_count(&session), 1);
        assert!(matches!(
            rx_live.try_recv().unwrap(),
            ObserverMessage::Liveness { .. }
        ));
    }

    proptest::proptest! {
        /// Whatever mix of observer tenants subscribes, an event is only
        /// ever delivered to observers tagged with its own tenant.
        #[test]
        fn isolation_holds_for_arbitrary_tenant_mixes(
            observer_tenants in proptest::collection::vec("t[0-9]", 1..12),
            event_tenant in "t[0-9]",
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            rt.block_on(async {
                let hub = hub();
                let session = SessionId("s1".into());
                let mut receivers = Vec::new();
                for tenant in &observer_tenants {
                    let (_, rx) = hub.subscribe(&session, TenantId(tenant.clone()));
                    receivers.push((tenant.clone(), rx));
                }

                hub.publish(&event("s1", &event_tenant));

                for (tenant, rx) in receivers.iter_mut() {
                    let got = rx.try_recv().is_ok();
                    assert_eq!(
                        got,
                        *tenant == event_tenant,
                        "observer of tenant {tenant} saw wrong delivery for event tenant {event_tenant}"
                    );
                }
            });
        }
    }

    #[tokio::test]
    async fn unsubscribe_session_clears_everything() {
        let hub = hub();
        let session = SessionId("s1".into());
        let (_a, _rx_a) = hub.subscribe(&session, TenantId("t".into()));
        let (_b, _rx_b) = hub.subscribe(&session, TenantId("t".into()));
        hub.unsubscribe_session(&session);
        assert_eq!(hub.observer_count(&session), 0);
    }
}
