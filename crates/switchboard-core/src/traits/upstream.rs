// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound seam into the upstream realtime channel.

use async_trait::async_trait;

use crate::error::SwitchboardError;

/// The outbound half of the upstream bridge, as seen by the control
/// arbiter.
///
/// All sends are no-ops (logged, not queued) when the channel is not
/// connected: stale actions against a dead channel must not resurrect
/// it. Callers either check [`is_connected`](Self::is_connected) or
/// accept the silent drop.
#[async_trait]
pub trait UpstreamSink: Send + Sync {
    /// Forward a subject utterance to the conversational AI.
    async fn send_subject_utterance(&self, text: &str) -> Result<(), SwitchboardError>;

    /// Non-blocking annotation the AI should use but not necessarily speak.
    async fn send_context_hint(&self, hint: &str) -> Result<(), SwitchboardError>;

    /// Return a tool result correlated by its tool-call id.
    async fn send_tool_result(
        &self,
        tool_call_id: &str,
        result: serde_json::Value,
    ) -> Result<(), SwitchboardError>;

    /// Whether the channel is currently connected.
    fn is_connected(&self) -> bool;
}
