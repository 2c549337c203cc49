// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket observer stream for the dashboard.
//!
//! `GET /ws?session=<key>&token=<bearer>&tenant=<id>` upgrades to a
//! one-way event stream. Auth happens during the handshake via query
//! parameters rather than middleware, since browser WebSocket clients
//! cannot set request headers.
//!
//! Server -> Client (JSON), one message per event:
//! ```json
//! {"kind": "event", "type": "agent_response", "session_id": "...", ...}
//! {"kind": "liveness", "at": "2026-08-25T12:00:00Z"}
//! ```

use axum::{
    extract::{
        ws::{Message, Utf8Bytes, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use switchboard_core::types::{SessionId, TenantId};

use crate::server::GatewayState;

/// Query parameters of the observer handshake.
#[derive(Debug, Deserialize)]
pub struct ObserverQuery {
    pub session: String,
    pub token: String,
    pub tenant: String,
}

/// WebSocket upgrade handler for dashboard observers.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ObserverQuery>,
    State(state): State<GatewayState>,
) -> Response {
    if !state.auth.token_matches(&query.token) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let session_id = SessionId(query.session);
    let tenant_id = TenantId(query.tenant);
    ws.on_upgrade(move |socket| observe(socket, state, session_id, tenant_id))
}

/// Pump hub messages to one observer connection.
///
/// The subscription is tagged with the tenant the handshake presented;
/// the hub withholds any event of another tenant regardless of what
/// session key was requested.
async fn observe(
    socket: WebSocket,
    state: GatewayState,
    session_id: SessionId,
    tenant_id: TenantId,
) {
    let (observer_id, mut events) = state.hub.subscribe(&session_id, tenant_id);
    let (mut ws_sender, mut ws_receiver) = socket.split();

    loop {
        tokio::select! {
            maybe_event = events.recv() => {
                let Some(message) = maybe_event else {
                    // Hub dropped us: session ended or we were pruned.
                    break;
                };
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!(observer_id = %observer_id, "unserializable observer message: {e}");
                        continue;
                    }
                };
                if ws_sender
                    .send(Message::Text(Utf8Bytes::from(json)))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            inbound = ws_receiver.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Observers are read-only; drop anything else.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.hub.unsubscribe(&session_id, &observer_id);
    let _ = ws_sender.send(Message::Close(None)).await;
    tracing::debug!(%session_id, observer_id = %observer_id, "observer disconnected");
}
