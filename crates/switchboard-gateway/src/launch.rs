// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seam through which the gateway starts new conversations.

use async_trait::async_trait;

use switchboard_core::types::Session;
use switchboard_core::SwitchboardError;

/// Starts a conversation: session actor plus its upstream channel.
///
/// The binary provides the production implementation; tests substitute
/// one backed by mocks.
#[async_trait]
pub trait SessionLaunch: Send + Sync {
    async fn launch(
        &self,
        session: Session,
        context: serde_json::Value,
    ) -> Result<(), SwitchboardError>;
}
