// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire protocol for the upstream realtime voice AI service.
//!
//! Provider frames are translated into the small internal
//! [`UpstreamEvent`] vocabulary. Unknown frame types are skipped, not
//! errors: the provider adds event types without versioning notice.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use switchboard_core::types::UpstreamEvent;

/// Frames the orchestrator sends to the provider.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderOutbound {
    /// Initiation message carrying per-conversation context variables.
    /// Must be the first frame after the socket opens.
    ConversationInit {
        conversation_id: String,
        context: Value,
    },
    /// Subject utterance forwarded into the conversation.
    UserMessage { text: String },
    /// Annotation the AI should use but not necessarily speak.
    ContextUpdate { text: String },
    /// Tool result correlated by the provider's tool-call id.
    ToolResult {
        tool_call_id: String,
        result: Value,
    },
    /// Liveness reply; must carry the ping's event id.
    Pong { event_id: u64 },
}

/// Frames the provider sends to the orchestrator.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderInbound {
    UserTranscriptStarted,
    UserTranscriptFinished,
    AgentResponse { text: String },
    ToolCall {
        tool_call_id: String,
        name: String,
        #[serde(default)]
        arguments: Value,
    },
    ConversationEnd {
        #[serde(default)]
        reason: Option<String>,
    },
    Error { message: String },
    Ping { event_id: u64 },
    /// Anything the provider adds later.
    #[serde(other)]
    Unknown,
}

/// What the read loop should do with a decoded provider frame.
#[derive(Debug)]
pub enum Translated {
    /// Forward this internal event to the session pipeline.
    Event(UpstreamEvent),
    /// Answer the provider's liveness ping immediately.
    ReplyPong { event_id: u64 },
    /// Skip silently (unknown frame type).
    Skip,
}

/// Translate one provider frame into the internal vocabulary.
pub fn translate(frame: ProviderInbound) -> Translated {
    match frame {
        ProviderInbound::UserTranscriptStarted => Translated::Event(UpstreamEvent::SpeechStarted),
        ProviderInbound::UserTranscriptFinished => Translated::Event(UpstreamEvent::SpeechEnded),
        ProviderInbound::AgentResponse { text } => {
            Translated::Event(UpstreamEvent::AgentText { text })
        }
        ProviderInbound::ToolCall {
            tool_call_id,
            name,
            arguments,
        } => Translated::Event(UpstreamEvent::ToolInvoked {
            tool_call_id,
            name,
            arguments,
        }),
        ProviderInbound::ConversationEnd { reason } => Translated::Event(UpstreamEvent::Ended {
            reason: reason.unwrap_or_else(|| "provider_end".to_string()),
        }),
        ProviderInbound::Error { message } => Translated::Event(UpstreamEvent::Error { message }),
        ProviderInbound::Ping { event_id } => Translated::ReplyPong { event_id },
        ProviderInbound::Unknown => Translated::Skip,
    }
}
