// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wires one new conversation together: session actor, upstream bridge,
//! and the pump between them.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

use switchboard_bridge::{EventLogSettings, UpstreamBridge};
use switchboard_config::model::UpstreamConfig;
use switchboard_control::ControlArbiter;
use switchboard_core::types::Session;
use switchboard_core::{StateStore, SubjectTransport, SwitchboardError};
use switchboard_gateway::SessionLaunch;

/// Capacity of the bridge-to-actor event channel.
const EVENT_BUFFER: usize = 64;

/// Starts conversations. The telephony integration (a trait seam) calls
/// [`launch`](Self::launch) when a call or message thread begins.
pub struct SessionLauncher {
    upstream: UpstreamConfig,
    store: Arc<dyn StateStore>,
    arbiter: Arc<ControlArbiter>,
    transport: Arc<dyn SubjectTransport>,
    log: EventLogSettings,
}

impl SessionLauncher {
    pub fn new(
        upstream: UpstreamConfig,
        store: Arc<dyn StateStore>,
        arbiter: Arc<ControlArbiter>,
        transport: Arc<dyn SubjectTransport>,
        log: EventLogSettings,
    ) -> Self {
        Self {
            upstream,
            store,
            arbiter,
            transport,
            log,
        }
    }

    /// Start the actor and the bridge for a fresh conversation.
    ///
    /// `context` carries the per-conversation variables the provider
    /// receives in the initiation frame (caller identity, campaign
    /// metadata). The bridge task reconnects on its own; cancelling
    /// happens through the actor at conversation end.
    pub async fn launch(
        &self,
        session: Session,
        context: serde_json::Value,
    ) -> Result<(), SwitchboardError> {
        let session_id = session.session_id.clone();

        let (event_tx, mut event_rx) = mpsc::channel(EVENT_BUFFER);
        let (bridge, handle) = UpstreamBridge::new(
            session_id.clone(),
            self.upstream.clone(),
            self.store.clone(),
            self.log.clone(),
            context,
            event_tx,
        )?;

        let bridge_cancel = self
            .arbiter
            .start_session(session, Arc::new(handle), self.transport.clone())
            .await?;

        tokio::spawn(bridge.run(bridge_cancel));

        // Pump translated provider events into the session actor. The
        // pump ends when the bridge closes the channel or the actor
        // goes away.
        let arbiter = self.arbiter.clone();
        let pump_session = session_id.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if arbiter.upstream_event(&pump_session, event).await.is_err() {
                    debug!(session_id = %pump_session, "actor gone, stopping event pump");
                    break;
                }
            }
        });

        info!(session_id = %session_id, "conversation launched");
        Ok(())
    }
}

#[async_trait]
impl SessionLaunch for SessionLauncher {
    async fn launch(
        &self,
        session: Session,
        context: serde_json::Value,
    ) -> Result<(), SwitchboardError> {
        SessionLauncher::launch(self, session, context).await
    }
}
