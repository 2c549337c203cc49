// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge to the upstream realtime conversational AI service.
//!
//! One [`UpstreamBridge`] runs per live conversation. It owns the
//! WebSocket to the provider, sends the initiation message, translates
//! provider frames into the internal [`UpstreamEvent`] vocabulary, and
//! re-establishes the channel on unclean closure with the shared
//! exponential-backoff policy -- fetching a fresh single-use token on
//! every attempt. Only consecutive failures count toward the attempt
//! cap; a healthy stretch resets it.
//!
//! Outbound sends are no-ops (logged, not queued) while the channel is
//! down: stale actions against a dead channel must not resurrect it.

pub mod protocol;
pub mod token;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use switchboard_config::model::UpstreamConfig;
use switchboard_core::types::{SessionId, UpstreamEvent};
use switchboard_core::{RetryPolicy, StateStore, SwitchboardError, UpstreamSink};

use protocol::{translate, ProviderOutbound, Translated};
use token::TokenClient;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Retention settings for the per-conversation event log.
#[derive(Debug, Clone)]
pub struct EventLogSettings {
    /// Newest entries kept per conversation.
    pub cap: usize,
    /// How long the log outlives the last append.
    pub ttl: Duration,
}

impl Default for EventLogSettings {
    fn default() -> Self {
        Self {
            cap: 100,
            ttl: Duration::from_secs(48 * 3600),
        }
    }
}

/// Outcome of one connected stretch of the socket.
enum PumpOutcome {
    /// Provider ended the conversation or teardown was requested.
    Clean,
    /// The socket dropped without a conversation end. `delivered` is
    /// true when at least one provider frame arrived on this stretch,
    /// which marks the stretch healthy and resets the failure count.
    Unclean { reason: String, delivered: bool },
}

/// The per-conversation bridge task. Created together with its
/// [`BridgeHandle`]; the caller spawns [`run`](Self::run).
pub struct UpstreamBridge {
    session_id: SessionId,
    config: UpstreamConfig,
    token_client: TokenClient,
    store: Arc<dyn StateStore>,
    log: EventLogSettings,
    /// Per-conversation context variables carried in the init frame.
    context: serde_json::Value,
    event_tx: mpsc::Sender<UpstreamEvent>,
    outbound_rx: mpsc::Receiver<ProviderOutbound>,
    connected: Arc<AtomicBool>,
}

/// Cheap clonable outbound handle into a running bridge.
#[derive(Clone)]
pub struct BridgeHandle {
    session_id: SessionId,
    outbound_tx: mpsc::Sender<ProviderOutbound>,
    connected: Arc<AtomicBool>,
}

impl UpstreamBridge {
    /// Build a bridge and its outbound handle.
    ///
    /// `event_tx` receives translated events in the order the provider
    /// sent them; the receiver side is the session pipeline.
    pub fn new(
        session_id: SessionId,
        config: UpstreamConfig,
        store: Arc<dyn StateStore>,
        log: EventLogSettings,
        context: serde_json::Value,
        event_tx: mpsc::Sender<UpstreamEvent>,
    ) -> Result<(Self, BridgeHandle), SwitchboardError> {
        let token_endpoint = config.token_endpoint.clone().ok_or_else(|| {
            SwitchboardError::Config("upstream.token_endpoint is required".into())
        })?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| SwitchboardError::Config("upstream.api_key is required".into()))?;
        let token_client = TokenClient::new(token_endpoint, api_key)?;

        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let connected = Arc::new(AtomicBool::new(false));
        let handle = BridgeHandle {
            session_id: session_id.clone(),
            outbound_tx,
            connected: connected.clone(),
        };
        let bridge = Self {
            session_id,
            config,
            token_client,
            store,
            log,
            context,
            event_tx,
            outbound_rx,
            connected,
        };
        Ok((bridge, handle))
    }

    fn reconnect_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.config.reconnect_base_ms),
            multiplier: self.config.reconnect_multiplier,
            max_attempts: self.config.reconnect_max_attempts,
            jitter: true,
        }
    }

    /// Run the connection loop until the conversation ends, teardown is
    /// requested, or reconnection attempts are exhausted.
    pub async fn run(mut self, cancel: CancellationToken) {
        let policy = self.reconnect_policy();
        let mut failures = 0u32;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.establish().await {
                Ok(ws) => {
                    self.connected.store(true, Ordering::SeqCst);
                    info!(session_id = %self.session_id, "upstream channel connected");
                    let outcome = self.pump(ws, &cancel).await;
                    self.connected.store(false, Ordering::SeqCst);
                    self.drop_stale_outbound();

                    match outcome {
                        PumpOutcome::Clean => break,
                        PumpOutcome::Unclean { reason, delivered } => {
                            warn!(session_id = %self.session_id, reason, "upstream channel dropped");
                            // Only consecutive failures count toward the
                            // cap: a healthy stretch resets the sequence
                            // and the backoff restarts from the base.
                            if delivered {
                                failures = 1;
                            } else {
                                failures += 1;
                            }
                        }
                    }
                }
                Err(err) => {
                    warn!(session_id = %self.session_id, error = %err, "upstream connect failed");
                    failures += 1;
                }
            }

            if failures >= policy.max_attempts {
                warn!(
                    session_id = %self.session_id,
                    attempts = failures,
                    "reconnection attempts exhausted"
                );
                self.emit(UpstreamEvent::Error {
                    message: "reconnection_failed".to_string(),
                })
                .await;
                self.emit(UpstreamEvent::Ended {
                    reason: "upstream_unavailable".to_string(),
                })
                .await;
                break;
            }

            let delay = policy.delay_for(failures - 1);
            debug!(
                session_id = %self.session_id,
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                "scheduling reconnect"
            );
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        debug!(session_id = %self.session_id, "bridge task finished");
    }

    /// One connection attempt: fresh grant, WebSocket handshake, init frame.
    async fn establish(&mut self) -> Result<WsStream, SwitchboardError> {
        let grant = self.token_client.fetch(&self.session_id.0).await?;
        let url = format!("{}?token={}", grant.signed_url, grant.token);

        let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.map_err(|e| {
            SwitchboardError::Connection {
                message: format!("websocket handshake failed: {e}"),
                source: Some(Box::new(e)),
            }
        })?;

        let init = ProviderOutbound::ConversationInit {
            conversation_id: self.session_id.0.clone(),
            context: self.context.clone(),
        };
        self.log_outbound(&init).await;
        let text = serde_json::to_string(&init).map_err(|e| SwitchboardError::Internal(
            format!("failed to encode init frame: {e}"),
        ))?;
        ws.send(Message::Text(text.into()))
            .await
            .map_err(|e| SwitchboardError::Connection {
                message: format!("failed to send init frame: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(ws)
    }

    /// Read/write loop for one connected stretch.
    async fn pump(&mut self, ws: WsStream, cancel: &CancellationToken) -> PumpOutcome {
        let (mut sink, mut stream) = ws.split();
        let mut delivered = false;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return PumpOutcome::Clean;
                }

                maybe_frame = self.outbound_rx.recv() => {
                    let Some(frame) = maybe_frame else {
                        // All handles dropped; nothing left to send.
                        return PumpOutcome::Clean;
                    };
                    self.log_outbound(&frame).await;
                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(err) => {
                            warn!(session_id = %self.session_id, error = %err, "failed to encode outbound frame");
                            continue;
                        }
                    };
                    if let Err(err) = sink.send(Message::Text(text.into())).await {
                        return PumpOutcome::Unclean {
                            reason: format!("send failed: {err}"),
                            delivered,
                        };
                    }
                }

                maybe_msg = stream.next() => {
                    match maybe_msg {
                        Some(Ok(Message::Text(text))) => {
                            delivered = true;
                            let frame: protocol::ProviderInbound = match serde_json::from_str(&text) {
                                Ok(frame) => frame,
                                Err(err) => {
                                    warn!(session_id = %self.session_id, error = %err, "undecodable provider frame");
                                    continue;
                                }
                            };
                            match translate(frame) {
                                Translated::Event(event) => {
                                    self.log_inbound(&event).await;
                                    let terminal = matches!(event, UpstreamEvent::Ended { .. });
                                    self.emit(event).await;
                                    if terminal {
                                        let _ = sink.send(Message::Close(None)).await;
                                        return PumpOutcome::Clean;
                                    }
                                }
                                Translated::ReplyPong { event_id } => {
                                    let pong = ProviderOutbound::Pong { event_id };
                                    let text = serde_json::to_string(&pong)
                                        .unwrap_or_else(|_| String::from("{\"type\":\"pong\"}"));
                                    if let Err(err) = sink.send(Message::Text(text.into())).await {
                                        return PumpOutcome::Unclean {
                                            reason: format!("pong failed: {err}"),
                                            delivered,
                                        };
                                    }
                                }
                                Translated::Skip => {}
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            if let Err(err) = sink.send(Message::Pong(payload)).await {
                                return PumpOutcome::Unclean {
                                    reason: format!("pong failed: {err}"),
                                    delivered,
                                };
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return PumpOutcome::Unclean {
                                reason: "closed by provider".to_string(),
                                delivered,
                            };
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            return PumpOutcome::Unclean {
                                reason: format!("read failed: {err}"),
                                delivered,
                            };
                        }
                    }
                }
            }
        }
    }

    /// Forward an internal event to the session pipeline.
    async fn emit(&self, event: UpstreamEvent) {
        if self.event_tx.send(event).await.is_err() {
            debug!(session_id = %self.session_id, "event receiver dropped");
        }
    }

    /// Discard frames queued while the channel was dropping. Dropped,
    /// never replayed: the conversation state they targeted is gone.
    fn drop_stale_outbound(&mut self) {
        while let Ok(frame) = self.outbound_rx.try_recv() {
            warn!(session_id = %self.session_id, ?frame, "dropping stale outbound frame");
        }
    }

    async fn log_inbound(&self, event: &UpstreamEvent) {
        self.log_entry(serde_json::json!({
            "direction": "inbound",
            "event": event,
            "at": chrono::Utc::now().to_rfc3339(),
        }))
        .await;
    }

    async fn log_outbound(&self, frame: &ProviderOutbound) {
        self.log_entry(serde_json::json!({
            "direction": "outbound",
            "frame": frame,
            "at": chrono::Utc::now().to_rfc3339(),
        }))
        .await;
    }

    /// Append to the per-conversation log; failures degrade, the event
    /// path is never blocked on the durable log.
    async fn log_entry(&self, entry: serde_json::Value) {
        let key = event_log_key(&self.session_id);
        if let Err(err) = self
            .store
            .append_to_list(&key, entry, self.log.cap, self.log.ttl)
            .await
        {
            warn!(session_id = %self.session_id, error = %err, "event log append failed, continuing");
        }
    }
}

/// Store key of the per-conversation event log.
fn event_log_key(session_id: &SessionId) -> String {
    format!("events:{session_id}")
}

#[async_trait]
impl UpstreamSink for BridgeHandle {
    async fn send_subject_utterance(&self, text: &str) -> Result<(), SwitchboardError> {
        self.dispatch(ProviderOutbound::UserMessage {
            text: text.to_string(),
        })
    }

    async fn send_context_hint(&self, hint: &str) -> Result<(), SwitchboardError> {
        self.dispatch(ProviderOutbound::ContextUpdate {
            text: hint.to_string(),
        })
    }

    async fn send_tool_result(
        &self,
        tool_call_id: &str,
        result: serde_json::Value,
    ) -> Result<(), SwitchboardError> {
        self.dispatch(ProviderOutbound::ToolResult {
            tool_call_id: tool_call_id.to_string(),
            result,
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl BridgeHandle {
    /// Hand a frame to the bridge task, or drop it (logged) when the
    /// channel is down.
    fn dispatch(&self, frame: ProviderOutbound) -> Result<(), SwitchboardError> {
        if !self.is_connected() {
            debug!(session_id = %self.session_id, ?frame, "channel not connected, dropping outbound frame");
            return Ok(());
        }
        if let Err(err) = self.outbound_tx.try_send(frame) {
            warn!(session_id = %self.session_id, error = %err, "outbound buffer rejected frame, dropping");
        }
        Ok(())
    }
}
