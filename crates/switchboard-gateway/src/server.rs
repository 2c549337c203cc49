// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Control-plane HTTP server built on axum.
//!
//! Sets up routes, auth middleware, and shared state.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use switchboard_control::ControlArbiter;
use switchboard_core::SwitchboardError;
use switchboard_hub::BroadcastHub;
use switchboard_limiter::RateLimiter;

use crate::auth::{auth_middleware, AuthConfig};
use crate::handlers;
use crate::launch::SessionLaunch;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub arbiter: Arc<ControlArbiter>,
    pub hub: Arc<BroadcastHub>,
    pub limiter: Arc<RateLimiter>,
    pub launcher: Arc<dyn SessionLaunch>,
    pub auth: AuthConfig,
    /// Process start time for uptime reporting.
    pub start_time: Instant,
}

/// Gateway server configuration (mirrors `GatewayConfig` from
/// switchboard-config, kept separate to avoid the config dependency).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token for control-plane auth (None = all requests rejected).
    pub bearer_token: Option<String>,
}

/// Build the full route table.
///
/// Split out from [`start_server`] so tests can drive the router
/// without binding a socket.
pub fn router(state: GatewayState) -> Router {
    // Unauthenticated liveness probe.
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    // Control-plane routes requiring bearer auth + identity headers.
    let api_routes = Router::new()
        .route("/v1/sessions", post(handlers::post_create_session))
        .route("/v1/sessions/{key}/join", post(handlers::post_join))
        .route("/v1/sessions/{key}/leave", post(handlers::post_leave))
        .route("/v1/sessions/{key}/message", post(handlers::post_message))
        .route("/v1/sessions/{key}", get(handlers::get_status))
        .route("/v1/sessions/{key}/queue", get(handlers::get_queue))
        .route(
            "/v1/sessions/{key}/queue/processed",
            post(handlers::post_processed),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    // Observer stream (auth happens during the handshake, not middleware).
    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
}

/// Bind and serve the control plane until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), SwitchboardError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener =
        tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| SwitchboardError::Connection {
                message: format!("failed to bind gateway to {addr}: {e}"),
                source: Some(Box::new(e)),
            })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| SwitchboardError::Connection {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(())
}
