// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the orchestrator components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a conversation session. Stable for the
/// lifetime of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Isolation boundary. Every read, write, and broadcast is scoped to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for one dashboard observer connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObserverId(pub String);

impl ObserverId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which party is currently authorized to author outbound messages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ControlOwner {
    Ai,
    Human,
}

/// The live record of one ongoing customer conversation.
///
/// Invariant: `control_session_id` is `Some` iff `control_owner == Human`.
/// Only the control arbiter writes `control_owner`/`control_session_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub tenant_id: TenantId,
    /// Normalized customer phone/contact identifier.
    pub subject_id: String,
    pub control_owner: ControlOwner,
    pub control_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh session under AI control.
    pub fn new(session_id: SessionId, tenant_id: TenantId, subject_id: String) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            tenant_id,
            subject_id,
            control_owner: ControlOwner::Ai,
            control_session_id: None,
            created_at: now,
            last_activity_at: now,
        }
    }
}

/// One human takeover of a session.
///
/// At most one control session per session has `ended_at == None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlSession {
    pub control_session_id: String,
    pub session_id: SessionId,
    pub agent_id: String,
    pub agent_name: String,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Subject messages held for the agent, oldest first.
    pub queued_messages: Vec<QueuedMessage>,
    pub messages_handled: u64,
}

impl ControlSession {
    pub fn new(session_id: SessionId, agent_id: String, agent_name: String) -> Self {
        let now = Utc::now();
        Self {
            control_session_id: uuid::Uuid::new_v4().to_string(),
            session_id,
            agent_id,
            agent_name,
            started_at: now,
            last_activity_at: now,
            ended_at: None,
            queued_messages: Vec::new(),
            messages_handled: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Where a queued message originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageOrigin {
    Subject,
    System,
}

/// A message that arrived from the subject while a human held control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: String,
    pub content: String,
    pub origin: MessageOrigin,
    pub received_at: DateTime<Utc>,
    pub processed: bool,
}

impl QueuedMessage {
    pub fn subject(content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content,
            origin: MessageOrigin::Subject,
            received_at: Utc::now(),
            processed: false,
        }
    }
}

/// Lifecycle state of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
}

/// A deferred work item (delayed SMS, reminder call) held in the
/// store's time-ordered queue. Delivery is at-least-once; consumers
/// must be idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: String,
    pub kind: String,
    pub payload: serde_json::Value,
    pub scheduled_for: DateTime<Utc>,
    pub status: TaskStatus,
}

/// Observer-facing event types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    ConversationStarted,
    UserTranscript,
    AgentResponse,
    ToolCall,
    HumanControlStarted,
    HumanControlEnded,
    CustomerMessageReceived,
    HumanMessageSent,
    ConversationEnded,
    ConversationError,
}

/// One event on the observer stream. Delivered in the order the
/// upstream bridge received the underlying activity, scoped to the
/// session's tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub session_id: SessionId,
    pub tenant_id: TenantId,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl SessionEvent {
    pub fn new(
        kind: EventKind,
        session_id: SessionId,
        tenant_id: TenantId,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            session_id,
            tenant_id,
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Internal vocabulary the bridge translates provider events into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum UpstreamEvent {
    SpeechStarted,
    SpeechEnded,
    AgentText { text: String },
    ToolInvoked {
        tool_call_id: String,
        name: String,
        arguments: serde_json::Value,
    },
    Ended { reason: String },
    Error { message: String },
}

/// Result of a subject-facing transport send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub delivery_id: String,
    pub status: DeliveryStatus,
}

/// Transport-reported delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryStatus {
    Queued,
    Sent,
    Failed,
}

/// Outcome of a sliding-window rate-limit check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

/// The verified identity attached to every control-plane request.
/// Verification happens outside the orchestrator; tenant match is
/// enforced inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub tenant_id: TenantId,
    pub agent_id: String,
    pub agent_name: String,
}
