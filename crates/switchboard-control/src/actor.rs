// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session actor serializing all control-state mutations.
//!
//! Every mutation of one session flows through its actor's mailbox, so
//! a racing `join` and inbound subject message are processed in arrival
//! order rather than interleaved. Different sessions run on independent
//! actors and process fully in parallel.
//!
//! Persistence discipline: control-state transitions (`join`, control
//! end) abort if the durable write fails, to avoid observable-but-
//! unpersisted state. Queue appends and activity touches degrade with a
//! warning, and broadcasts always proceed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use switchboard_core::types::{
    AgentIdentity, ControlOwner, ControlSession, DeliveryReceipt, EventKind, QueuedMessage,
    Session, SessionEvent, UpstreamEvent,
};
use switchboard_core::{RecordSink, SubjectTransport, SwitchboardError, UpstreamSink};
use switchboard_hub::BroadcastHub;

use crate::registry::SessionRegistry;

/// Point-in-time view returned by `status`.
#[derive(Debug, Clone)]
pub struct StatusView {
    pub under_control: bool,
    pub session: Session,
    pub control: Option<ControlSession>,
}

/// Commands a session actor processes, strictly in arrival order.
pub enum SessionCommand {
    Join {
        identity: AgentIdentity,
        reason: Option<String>,
        opening_message: Option<String>,
        reply: oneshot::Sender<Result<ControlSession, SwitchboardError>>,
    },
    Leave {
        requested_by: Option<AgentIdentity>,
        summary: Option<String>,
        next_steps: Option<String>,
        success: bool,
        reason: String,
        reply: oneshot::Sender<Result<ControlSession, SwitchboardError>>,
    },
    SendAsHuman {
        identity: AgentIdentity,
        message: String,
        reply: oneshot::Sender<Result<DeliveryReceipt, SwitchboardError>>,
    },
    Status {
        reply: oneshot::Sender<StatusView>,
    },
    Queue {
        reply: oneshot::Sender<Vec<QueuedMessage>>,
    },
    MarkProcessed {
        ids: Vec<String>,
        reply: oneshot::Sender<Result<u64, SwitchboardError>>,
    },
    /// Inbound message from the subject (SMS webhook or equivalent).
    SubjectMessage { content: String },
    /// Translated event from the upstream bridge.
    Upstream(UpstreamEvent),
    /// Inactivity sweep check.
    CheckTimeout {
        control_timeout: Duration,
        session_timeout: Duration,
    },
    /// Explicit conversation end.
    End { reason: String },
}

/// Owns the state of one conversation and processes its mailbox.
pub struct SessionActor {
    session: Session,
    control: Option<ControlSession>,
    registry: SessionRegistry,
    hub: Arc<BroadcastHub>,
    upstream: Arc<dyn UpstreamSink>,
    transport: Arc<dyn SubjectTransport>,
    /// Best-effort durable sink for transcripts and lead updates.
    records: Option<Arc<dyn RecordSink>>,
    rx: mpsc::Receiver<SessionCommand>,
    /// Cancelling tears down the bridge task for this conversation.
    bridge_cancel: CancellationToken,
}

impl SessionActor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        session: Session,
        registry: SessionRegistry,
        hub: Arc<BroadcastHub>,
        upstream: Arc<dyn UpstreamSink>,
        transport: Arc<dyn SubjectTransport>,
        records: Option<Arc<dyn RecordSink>>,
        rx: mpsc::Receiver<SessionCommand>,
        bridge_cancel: CancellationToken,
    ) -> Self {
        Self {
            session,
            control: None,
            registry,
            hub,
            upstream,
            transport,
            records,
            rx,
            bridge_cancel,
        }
    }

    /// Process the mailbox until the conversation ends.
    ///
    /// Returning performs scoped teardown: the bridge reconnect loop is
    /// cancelled, observers are unsubscribed, and final state is
    /// flushed before the actor goes away.
    pub async fn run(mut self) {
        self.broadcast(
            EventKind::ConversationStarted,
            serde_json::json!({ "subject_id": self.session.subject_id }),
        ).await;

        while let Some(command) = self.rx.recv().await {
            let terminal = self.handle(command).await;
            if terminal {
                break;
            }
        }

        self.bridge_cancel.cancel();
        self.hub.unsubscribe_session(&self.session.session_id);
        if let Err(err) = self.registry.delete(&self.session.session_id).await {
            warn!(
                session_id = %self.session.session_id,
                error = %err,
                "failed to flush session removal"
            );
        }
        debug!(session_id = %self.session.session_id, "session actor finished");
    }

    /// Handle one command; returns true when the conversation is over.
    async fn handle(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Join {
                identity,
                reason,
                opening_message,
                reply,
            } => {
                let result = self.join(identity, reason, opening_message).await;
                let _ = reply.send(result);
                false
            }
            SessionCommand::Leave {
                requested_by,
                summary,
                next_steps,
                success,
                reason,
                reply,
            } => {
                let result = self
                    .end_control(requested_by.as_ref(), summary, next_steps, success, &reason)
                    .await;
                let _ = reply.send(result);
                false
            }
            SessionCommand::SendAsHuman {
                identity,
                message,
                reply,
            } => {
                let result = self.send_as_human(&identity, &message).await;
                let _ = reply.send(result);
                false
            }
            SessionCommand::Status { reply } => {
                let _ = reply.send(StatusView {
                    under_control: self.control.is_some(),
                    session: self.session.clone(),
                    control: self.control.clone(),
                });
                false
            }
            SessionCommand::Queue { reply } => {
                let queued = self
                    .control
                    .as_ref()
                    .map(|c| c.queued_messages.clone())
                    .unwrap_or_default();
                let _ = reply.send(queued);
                false
            }
            SessionCommand::MarkProcessed { ids, reply } => {
                let result = self.mark_processed(&ids).await;
                let _ = reply.send(result);
                false
            }
            SessionCommand::SubjectMessage { content } => {
                self.subject_message(content).await;
                false
            }
            SessionCommand::Upstream(event) => self.upstream_event(event).await,
            SessionCommand::CheckTimeout {
                control_timeout,
                session_timeout,
            } => self.check_timeout(control_timeout, session_timeout).await,
            SessionCommand::End { reason } => {
                self.end_conversation(&reason).await;
                true
            }
        }
    }

    /// `join`: AI_ACTIVE -> HUMAN_ACTIVE.
    async fn join(
        &mut self,
        identity: AgentIdentity,
        reason: Option<String>,
        opening_message: Option<String>,
    ) -> Result<ControlSession, SwitchboardError> {
        if let Some(existing) = &self.control {
            return Err(SwitchboardError::AlreadyUnderControl {
                session_id: self.session.session_id.0.clone(),
                holder: existing.agent_id.clone(),
            });
        }

        let control = ControlSession::new(
            self.session.session_id.clone(),
            identity.agent_id.clone(),
            identity.agent_name.clone(),
        );

        // Durable write first: an unpersisted takeover must never be
        // observable.
        self.registry.upsert_control(&control).await?;
        let mut session = self.session.clone();
        session.control_owner = ControlOwner::Human;
        session.control_session_id = Some(control.control_session_id.clone());
        session.last_activity_at = chrono::Utc::now();
        self.registry.upsert(&session).await?;

        self.session = session;
        self.control = Some(control.clone());

        info!(
            session_id = %self.session.session_id,
            agent_id = %identity.agent_id,
            "human control started"
        );
        self.broadcast(
            EventKind::HumanControlStarted,
            serde_json::json!({
                "control_session_id": control.control_session_id,
                "agent_id": identity.agent_id,
                "agent_name": identity.agent_name,
                "reason": reason,
            }),
        ).await;

        if let Some(opening) = opening_message {
            // Opening line failures do not undo the takeover.
            if let Err(err) = self.deliver_human_message(&identity, &opening).await {
                warn!(
                    session_id = %self.session.session_id,
                    error = %err,
                    "opening message delivery failed"
                );
            }
        }

        Ok(control)
    }

    /// End the active control session: HUMAN_ACTIVE -> AI_ACTIVE.
    ///
    /// Shared by `leave` and the inactivity sweep; the two differ only
    /// in `requested_by`, `success`, and `reason`.
    async fn end_control(
        &mut self,
        requested_by: Option<&AgentIdentity>,
        summary: Option<String>,
        next_steps: Option<String>,
        success: bool,
        reason: &str,
    ) -> Result<ControlSession, SwitchboardError> {
        let Some(control) = &self.control else {
            return Err(SwitchboardError::NotUnderControl {
                session_id: self.session.session_id.0.clone(),
            });
        };
        if let Some(identity) = requested_by {
            if identity.agent_id != control.agent_id {
                return Err(SwitchboardError::NotUnderControl {
                    session_id: self.session.session_id.0.clone(),
                });
            }
        }

        let mut ended = control.clone();
        ended.ended_at = Some(chrono::Utc::now());
        let drained: Vec<QueuedMessage> = ended
            .queued_messages
            .iter()
            .filter(|m| !m.processed)
            .cloned()
            .collect();
        for message in &mut ended.queued_messages {
            message.processed = true;
        }

        // Durable write first, as in join.
        self.registry.upsert_control(&ended).await?;
        let mut session = self.session.clone();
        session.control_owner = ControlOwner::Ai;
        session.control_session_id = None;
        session.last_activity_at = chrono::Utc::now();
        self.registry.upsert(&session).await?;

        self.session = session;
        self.control = None;

        // Replay held messages as synthetic subject utterances so the
        // AI regains full context, then hand it the wrap-up summary.
        for message in &drained {
            if let Err(err) = self.upstream.send_subject_utterance(&message.content).await {
                warn!(
                    session_id = %self.session.session_id,
                    error = %err,
                    "failed to replay queued message to upstream"
                );
            }
        }
        if let Some(summary) = &summary {
            let hint = format!("Agent handoff summary: {summary}");
            if let Err(err) = self.upstream.send_context_hint(&hint).await {
                warn!(session_id = %self.session.session_id, error = %err, "summary hint failed");
            }
        }

        info!(
            session_id = %self.session.session_id,
            agent_id = %ended.agent_id,
            reason,
            drained = drained.len(),
            "human control ended"
        );
        self.broadcast(
            EventKind::HumanControlEnded,
            serde_json::json!({
                "control_session_id": ended.control_session_id,
                "agent_id": ended.agent_id,
                "handoff_success": success,
                "reason": reason,
                "summary": summary,
                "next_steps": next_steps,
                "messages_handled": ended.messages_handled,
                "drained": drained.len(),
            }),
        ).await;

        Ok(ended)
    }

    /// `sendAsHuman`: deliver via the subject transport, never the
    /// realtime channel.
    async fn send_as_human(
        &mut self,
        identity: &AgentIdentity,
        message: &str,
    ) -> Result<DeliveryReceipt, SwitchboardError> {
        let Some(control) = &self.control else {
            return Err(SwitchboardError::NotUnderControl {
                session_id: self.session.session_id.0.clone(),
            });
        };
        if control.agent_id != identity.agent_id {
            return Err(SwitchboardError::NotUnderControl {
                session_id: self.session.session_id.0.clone(),
            });
        }

        self.deliver_human_message(identity, message).await
    }

    async fn deliver_human_message(
        &mut self,
        identity: &AgentIdentity,
        message: &str,
    ) -> Result<DeliveryReceipt, SwitchboardError> {
        let receipt = self
            .transport
            .send_message(&self.session.subject_id, message)
            .await?;

        self.touch_control().await;
        self.broadcast(
            EventKind::HumanMessageSent,
            serde_json::json!({
                "agent_id": identity.agent_id,
                "message": message,
                "delivery_id": receipt.delivery_id,
            }),
        ).await;
        Ok(receipt)
    }

    /// Mark queued messages processed. Idempotent: replaying the same
    /// ids neither flips state back nor double-counts
    /// `messages_handled`.
    async fn mark_processed(&mut self, ids: &[String]) -> Result<u64, SwitchboardError> {
        let Some(control) = &mut self.control else {
            return Err(SwitchboardError::NotUnderControl {
                session_id: self.session.session_id.0.clone(),
            });
        };

        let mut newly_marked = 0u64;
        for message in &mut control.queued_messages {
            if ids.contains(&message.id) && !message.processed {
                message.processed = true;
                newly_marked += 1;
            }
        }
        control.messages_handled += newly_marked;
        control.last_activity_at = chrono::Utc::now();

        let processed_count = control
            .queued_messages
            .iter()
            .filter(|m| ids.contains(&m.id) && m.processed)
            .count() as u64;

        if newly_marked > 0 {
            let control = control.clone();
            if let Err(err) = self.registry.upsert_control(&control).await {
                warn!(
                    session_id = %self.session.session_id,
                    error = %err,
                    "queue state write failed, continuing"
                );
            }
        }
        Ok(processed_count)
    }

    /// Route an inbound subject message by control state.
    async fn subject_message(&mut self, content: String) {
        self.touch_session().await;

        match self.session.control_owner {
            ControlOwner::Human => {
                let message = QueuedMessage::subject(content);
                let payload = serde_json::json!({
                    "message_id": message.id,
                    "content": message.content,
                    "origin": message.origin,
                    "received_at": message.received_at,
                });
                if let Some(control) = &mut self.control {
                    control.queued_messages.push(message);
                    control.last_activity_at = chrono::Utc::now();
                    let snapshot = control.clone();
                    if let Err(err) = self.registry.upsert_control(&snapshot).await {
                        warn!(
                            session_id = %self.session.session_id,
                            error = %err,
                            "queue append write failed, continuing"
                        );
                    }
                }
                // Surface on the dashboard; never forwarded to the AI.
                self.broadcast(EventKind::CustomerMessageReceived, payload).await;
            }
            ControlOwner::Ai => {
                if let Err(err) = self.upstream.send_subject_utterance(&content).await {
                    warn!(
                        session_id = %self.session.session_id,
                        error = %err,
                        "failed to forward subject message upstream"
                    );
                }
                self.broadcast(
                    EventKind::UserTranscript,
                    serde_json::json!({ "text": content }),
                ).await;
            }
        }
    }

    /// Translate one upstream event into broadcasts and state changes.
    /// Returns true when the conversation ended.
    async fn upstream_event(&mut self, event: UpstreamEvent) -> bool {
        self.touch_session().await;
        match event {
            UpstreamEvent::SpeechStarted => {
                self.broadcast(
                    EventKind::UserTranscript,
                    serde_json::json!({ "speech": "started" }),
                ).await;
                false
            }
            UpstreamEvent::SpeechEnded => {
                self.broadcast(
                    EventKind::UserTranscript,
                    serde_json::json!({ "speech": "ended" }),
                ).await;
                false
            }
            UpstreamEvent::AgentText { text } => {
                self.broadcast(EventKind::AgentResponse, serde_json::json!({ "text": text }))
                    .await;
                false
            }
            UpstreamEvent::ToolInvoked {
                tool_call_id,
                name,
                arguments,
            } => {
                self.broadcast(
                    EventKind::ToolCall,
                    serde_json::json!({
                        "tool_call_id": tool_call_id,
                        "name": name,
                        "arguments": arguments,
                    }),
                ).await;
                false
            }
            UpstreamEvent::Error { message } => {
                self.broadcast(
                    EventKind::ConversationError,
                    serde_json::json!({ "message": message }),
                ).await;
                false
            }
            UpstreamEvent::Ended { reason } => {
                self.end_conversation(&reason).await;
                true
            }
        }
    }

    /// Inactivity sweep: end a control session whose agent went quiet,
    /// or tear down a conversation that has gone silent with no human
    /// attached. Returns true when the conversation is over.
    async fn check_timeout(&mut self, control_timeout: Duration, session_timeout: Duration) -> bool {
        if let Some(control) = &self.control {
            let idle = chrono::Utc::now() - control.last_activity_at;
            if idle.to_std().unwrap_or(Duration::ZERO) < control_timeout {
                return false;
            }

            info!(
                session_id = %self.session.session_id,
                agent_id = %control.agent_id,
                idle_mins = idle.num_minutes(),
                "evicting stale control session"
            );
            if let Err(err) = self.end_control(None, None, None, false, "timeout").await {
                warn!(
                    session_id = %self.session.session_id,
                    error = %err,
                    "stale control eviction failed, will retry next sweep"
                );
            }
            // Eviction refreshes activity; the session itself survives
            // until the next sweep finds it idle.
            return false;
        }

        let idle = chrono::Utc::now() - self.session.last_activity_at;
        if idle.to_std().unwrap_or(Duration::ZERO) < session_timeout {
            return false;
        }

        info!(
            session_id = %self.session.session_id,
            idle_mins = idle.num_minutes(),
            "ending idle conversation"
        );
        self.end_conversation("inactivity").await;
        true
    }

    /// Terminal teardown: end any active control, then announce the end.
    async fn end_conversation(&mut self, reason: &str) {
        if self.control.is_some() {
            if let Err(err) = self
                .end_control(None, None, None, false, "session_ended")
                .await
            {
                warn!(
                    session_id = %self.session.session_id,
                    error = %err,
                    "failed to close control session during teardown"
                );
                // Keep going: teardown must not wedge on persistence.
                self.control = None;
            }
        }
        self.broadcast(
            EventKind::ConversationEnded,
            serde_json::json!({ "reason": reason }),
        ).await;
    }

    async fn touch_session(&mut self) {
        let now = chrono::Utc::now();
        self.session.last_activity_at = now;
        if let Err(err) = self.registry.touch(&self.session.session_id, now).await {
            warn!(
                session_id = %self.session.session_id,
                error = %err,
                "activity touch failed, continuing"
            );
        }
    }

    async fn touch_control(&mut self) {
        if let Some(control) = &mut self.control {
            control.last_activity_at = chrono::Utc::now();
            let snapshot = control.clone();
            if let Err(err) = self.registry.upsert_control(&snapshot).await {
                warn!(
                    session_id = %self.session.session_id,
                    error = %err,
                    "control touch failed, continuing"
                );
            }
        }
    }

    /// Broadcasts always proceed, even when a durable write just failed.
    /// The record sink gets the same event best-effort afterwards.
    async fn broadcast(&self, kind: EventKind, payload: serde_json::Value) {
        let event = SessionEvent::new(
            kind,
            self.session.session_id.clone(),
            self.session.tenant_id.clone(),
            payload,
        );
        self.hub.publish(&event);
        if let Some(records) = &self.records {
            if let Err(err) = records.record(&self.session.session_id, &event).await {
                warn!(
                    session_id = %self.session.session_id,
                    error = %err,
                    "record sink write failed, continuing"
                );
            }
        }
    }
}
