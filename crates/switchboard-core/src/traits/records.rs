// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable record sink trait (transcripts, lead updates).

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::types::{SessionEvent, SessionId};

/// Best-effort sink for transcripts and lead updates.
///
/// The orchestrator must keep functioning (degraded) when this sink is
/// unavailable: callers log sink failures and continue.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Record one session event for durable keeping.
    async fn record(
        &self,
        session_id: &SessionId,
        event: &SessionEvent,
    ) -> Result<(), SwitchboardError>;
}
