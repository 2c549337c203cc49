// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Front door to the per-session actors.
//!
//! The arbiter owns the map of live session handles, enforces the
//! tenant boundary before any command crosses into an actor, and runs
//! the inactivity sweep that evicts agents who went quiet.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use switchboard_core::types::{
    AgentIdentity, ControlSession, DeliveryReceipt, QueuedMessage, Session, SessionId,
    TenantId, UpstreamEvent,
};
use switchboard_core::{RecordSink, StateStore, SubjectTransport, SwitchboardError, UpstreamSink};
use switchboard_hub::BroadcastHub;

use crate::actor::{SessionActor, SessionCommand, StatusView};
use crate::registry::SessionRegistry;

struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    tenant_id: TenantId,
    /// Cancels the session's upstream bridge task.
    bridge_cancel: CancellationToken,
}

/// Parameters for a join request.
#[derive(Debug, Default)]
pub struct JoinRequest {
    pub reason: Option<String>,
    pub opening_message: Option<String>,
}

/// Parameters for a leave request.
#[derive(Debug, Default)]
pub struct LeaveRequest {
    pub summary: Option<String>,
    pub next_steps: Option<String>,
}

/// Spawns and addresses session actors; the only entry point the
/// gateway and webhooks use to touch a conversation.
pub struct ControlArbiter {
    sessions: Arc<DashMap<SessionId, SessionHandle>>,
    registry: SessionRegistry,
    hub: Arc<BroadcastHub>,
    records: Option<Arc<dyn RecordSink>>,
    mailbox_depth: usize,
    inactivity_timeout: Duration,
    session_idle_timeout: Duration,
}

impl ControlArbiter {
    pub fn new(
        store: Arc<dyn StateStore>,
        hub: Arc<BroadcastHub>,
        mailbox_depth: usize,
        inactivity_timeout: Duration,
    ) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            registry: SessionRegistry::new(store),
            hub,
            records: None,
            mailbox_depth,
            inactivity_timeout,
            session_idle_timeout: Duration::from_secs(24 * 3600),
        }
    }

    /// Attach a durable record sink. Every broadcast event is also
    /// offered to the sink, best-effort.
    pub fn with_record_sink(mut self, records: Arc<dyn RecordSink>) -> Self {
        self.records = Some(records);
        self
    }

    /// Override how long a conversation may sit idle, with no human
    /// attached, before the sweep tears it down. Defaults to 24h.
    pub fn with_session_idle_timeout(mut self, timeout: Duration) -> Self {
        self.session_idle_timeout = timeout;
        self
    }

    /// Start the actor for a new conversation. The returned token must
    /// be handed to the session's bridge task; cancelling it is how the
    /// actor tears the bridge down.
    pub async fn start_session(
        &self,
        session: Session,
        upstream: Arc<dyn UpstreamSink>,
        transport: Arc<dyn SubjectTransport>,
    ) -> Result<CancellationToken, SwitchboardError> {
        let session_id = session.session_id.clone();
        if self.sessions.contains_key(&session_id) {
            return Err(SwitchboardError::Internal(format!(
                "session {session_id} already running"
            )));
        }

        self.registry.upsert(&session).await?;

        let (tx, rx) = mpsc::channel(self.mailbox_depth);
        let bridge_cancel = CancellationToken::new();
        let actor = SessionActor::new(
            session.clone(),
            self.registry.clone(),
            Arc::clone(&self.hub),
            upstream,
            transport,
            self.records.clone(),
            rx,
            bridge_cancel.clone(),
        );

        self.sessions.insert(
            session_id.clone(),
            SessionHandle {
                tx,
                tenant_id: session.tenant_id.clone(),
                bridge_cancel: bridge_cancel.clone(),
            },
        );

        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            actor.run().await;
            sessions.remove(&session_id);
        });

        info!(
            session_id = %session.session_id,
            tenant_id = %session.tenant_id,
            "session started"
        );
        Ok(bridge_cancel)
    }

    /// Number of live sessions, across all tenants.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Whether a session actor is currently running for this key.
    pub fn is_active(&self, session_id: &SessionId) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub async fn join(
        &self,
        session_id: &SessionId,
        identity: &AgentIdentity,
        request: JoinRequest,
    ) -> Result<ControlSession, SwitchboardError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(
            session_id,
            Some(identity),
            SessionCommand::Join {
                identity: identity.clone(),
                reason: request.reason,
                opening_message: request.opening_message,
                reply,
            },
        )
        .await?;
        Self::await_reply(rx).await?
    }

    pub async fn leave(
        &self,
        session_id: &SessionId,
        identity: &AgentIdentity,
        request: LeaveRequest,
    ) -> Result<ControlSession, SwitchboardError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(
            session_id,
            Some(identity),
            SessionCommand::Leave {
                requested_by: Some(identity.clone()),
                summary: request.summary,
                next_steps: request.next_steps,
                success: true,
                reason: "agent_left".into(),
                reply,
            },
        )
        .await?;
        Self::await_reply(rx).await?
    }

    pub async fn send_as_human(
        &self,
        session_id: &SessionId,
        identity: &AgentIdentity,
        message: String,
    ) -> Result<DeliveryReceipt, SwitchboardError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(
            session_id,
            Some(identity),
            SessionCommand::SendAsHuman {
                identity: identity.clone(),
                message,
                reply,
            },
        )
        .await?;
        Self::await_reply(rx).await?
    }

    pub async fn status(
        &self,
        session_id: &SessionId,
        identity: &AgentIdentity,
    ) -> Result<StatusView, SwitchboardError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(session_id, Some(identity), SessionCommand::Status { reply })
            .await?;
        Self::await_reply(rx).await
    }

    pub async fn queue(
        &self,
        session_id: &SessionId,
        identity: &AgentIdentity,
    ) -> Result<Vec<QueuedMessage>, SwitchboardError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(session_id, Some(identity), SessionCommand::Queue { reply })
            .await?;
        Self::await_reply(rx).await
    }

    pub async fn mark_processed(
        &self,
        session_id: &SessionId,
        identity: &AgentIdentity,
        ids: Vec<String>,
    ) -> Result<u64, SwitchboardError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(
            session_id,
            Some(identity),
            SessionCommand::MarkProcessed { ids, reply },
        )
        .await?;
        Self::await_reply(rx).await?
    }

    /// Inbound message from the subject. No agent identity: the
    /// transport webhook authenticated it, the actor routes it by
    /// control state.
    pub async fn subject_message(
        &self,
        session_id: &SessionId,
        content: String,
    ) -> Result<(), SwitchboardError> {
        self.dispatch(session_id, None, SessionCommand::SubjectMessage { content })
            .await
    }

    /// Translated upstream event for the session's actor.
    pub async fn upstream_event(
        &self,
        session_id: &SessionId,
        event: UpstreamEvent,
    ) -> Result<(), SwitchboardError> {
        self.dispatch(session_id, None, SessionCommand::Upstream(event))
            .await
    }

    /// End a conversation from the outside (transport hangup webhook).
    pub async fn end_session(
        &self,
        session_id: &SessionId,
        reason: String,
    ) -> Result<(), SwitchboardError> {
        self.dispatch(session_id, None, SessionCommand::End { reason })
            .await
    }

    /// One sweep pass: every actor checks its control session against
    /// the agent inactivity timeout, and the conversation itself
    /// against the session idle timeout.
    pub async fn sweep_once(&self) {
        let handles: Vec<(SessionId, mpsc::Sender<SessionCommand>)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().tx.clone()))
            .collect();
        for (session_id, tx) in handles {
            if tx
                .send(SessionCommand::CheckTimeout {
                    control_timeout: self.inactivity_timeout,
                    session_timeout: self.session_idle_timeout,
                })
                .await
                .is_err()
            {
                debug!(%session_id, "sweep skipped finished session");
            }
        }
    }

    /// Periodic inactivity sweep until `cancel` fires.
    pub async fn run_sweep(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("inactivity sweep stopping");
                    return;
                }
                _ = ticker.tick() => self.sweep_once().await,
            }
        }
    }

    /// Cancel every session's bridge and let the actors drain. Used on
    /// orchestrator shutdown.
    pub fn shutdown(&self) {
        for entry in self.sessions.iter() {
            entry.value().bridge_cancel.cancel();
        }
    }

    /// Tenant check plus mailbox send. The check happens here, before
    /// the command ever reaches the actor, so a wrong-tenant caller
    /// cannot even perturb the target session's ordering.
    async fn dispatch(
        &self,
        session_id: &SessionId,
        identity: Option<&AgentIdentity>,
        command: SessionCommand,
    ) -> Result<(), SwitchboardError> {
        let tx = {
            let Some(handle) = self.sessions.get(session_id) else {
                return Err(SwitchboardError::SessionNotFound {
                    session_id: session_id.0.clone(),
                });
            };
            if let Some(identity) = identity {
                if identity.tenant_id != handle.tenant_id {
                    warn!(
                        security = true,
                        %session_id,
                        agent_id = %identity.agent_id,
                        agent_tenant = %identity.tenant_id,
                        session_tenant = %handle.tenant_id,
                        "cross-tenant session access denied"
                    );
                    return Err(SwitchboardError::CrossTenantAccess {
                        expected: handle.tenant_id.0.clone(),
                        actual: identity.tenant_id.0.clone(),
                    });
                }
            }
            handle.tx.clone()
        };

        tx.send(command)
            .await
            .map_err(|_| SwitchboardError::StaleSession {
                session_id: session_id.0.clone(),
            })
    }

    async fn await_reply<T>(rx: oneshot::Receiver<T>) -> Result<T, SwitchboardError> {
        rx.await
            .map_err(|_| SwitchboardError::Internal("session actor dropped reply".into()))
    }
}
