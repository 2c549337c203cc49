// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the control-plane REST API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use switchboard_core::types::{
    AgentIdentity, ControlSession, QueuedMessage, Session, SessionId,
};
use switchboard_core::SwitchboardError;
use switchboard_control::{JoinRequest, LeaveRequest};

use crate::server::GatewayState;

/// Request body for POST /v1/sessions.
#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    /// Stable conversation key; generated when absent.
    #[serde(default)]
    pub session_key: Option<String>,
    /// Normalized customer phone/contact identifier.
    pub subject_id: String,
    /// Per-conversation context handed to the upstream provider.
    #[serde(default)]
    pub context: serde_json::Value,
}

/// Response body for POST /v1/sessions.
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// Request body for POST /v1/sessions/{key}/join.
#[derive(Debug, Default, Deserialize)]
pub struct JoinBody {
    #[serde(default)]
    pub reason: Option<String>,
    /// Optional first message delivered to the subject on takeover.
    #[serde(default)]
    pub opening_message: Option<String>,
}

/// Request body for POST /v1/sessions/{key}/leave.
#[derive(Debug, Default, Deserialize)]
pub struct LeaveBody {
    /// Summary handed to the AI for context on resume.
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub next_steps: Option<String>,
}

/// Request body for POST /v1/sessions/{key}/message.
#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

/// Request body for POST /v1/sessions/{key}/queue/processed.
#[derive(Debug, Deserialize)]
pub struct ProcessedBody {
    pub message_ids: Vec<String>,
}

/// Response body for control-session returning endpoints.
#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub control_session_id: String,
    pub agent_id: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub messages_handled: u64,
}

impl From<ControlSession> for ControlResponse {
    fn from(c: ControlSession) -> Self {
        Self {
            control_session_id: c.control_session_id,
            agent_id: c.agent_id,
            started_at: c.started_at.to_rfc3339(),
            ended_at: c.ended_at.map(|t| t.to_rfc3339()),
            messages_handled: c.messages_handled,
        }
    }
}

/// Response body for POST /v1/sessions/{key}/message.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub delivery_id: String,
    pub status: String,
}

/// Response body for GET /v1/sessions/{key}.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub session_id: String,
    pub control_owner: String,
    pub under_control: bool,
    pub controlling_agent: Option<String>,
    pub queued_messages: usize,
    pub observers: usize,
    pub last_activity_at: String,
}

/// Response body for GET /v1/sessions/{key}/queue.
#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub messages: Vec<QueueEntry>,
}

#[derive(Debug, Serialize)]
pub struct QueueEntry {
    pub id: String,
    pub content: String,
    pub origin: String,
    pub received_at: String,
    pub processed: bool,
}

impl From<QueuedMessage> for QueueEntry {
    fn from(m: QueuedMessage) -> Self {
        Self {
            id: m.id,
            content: m.content,
            origin: m.origin.to_string(),
            received_at: m.received_at.to_rfc3339(),
            processed: m.processed,
        }
    }
}

/// Response body for POST /v1/sessions/{key}/queue/processed.
#[derive(Debug, Serialize)]
pub struct ProcessedResponse {
    pub processed: u64,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_at: Option<String>,
}

/// Map a control-plane error onto an HTTP response.
///
/// Cross-tenant denials are reported as not-found so the caller cannot
/// probe for other tenants' session keys.
pub fn error_response(err: SwitchboardError) -> Response {
    let (status, retry_at) = match &err {
        SwitchboardError::SessionNotFound { .. } => (StatusCode::NOT_FOUND, None),
        SwitchboardError::CrossTenantAccess { .. } => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "session not found".to_string(),
                    retry_at: None,
                }),
            )
                .into_response();
        }
        SwitchboardError::AlreadyUnderControl { .. } => (StatusCode::CONFLICT, None),
        SwitchboardError::NotUnderControl { .. } => (StatusCode::CONFLICT, None),
        SwitchboardError::RateLimitExceeded { reset_at } => {
            (StatusCode::TOO_MANY_REQUESTS, Some(reset_at.to_rfc3339()))
        }
        SwitchboardError::StaleSession { .. } => (StatusCode::GONE, None),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, None),
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            retry_at,
        }),
    )
        .into_response()
}

/// POST /v1/sessions
///
/// Start a conversation under the caller's tenant and connect its
/// upstream channel.
pub async fn post_create_session(
    State(state): State<GatewayState>,
    Extension(identity): Extension<AgentIdentity>,
    Json(body): Json<CreateSessionBody>,
) -> Response {
    let session_id = SessionId(
        body.session_key
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
    );
    if state.arbiter.is_active(&session_id) {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("session {session_id} already exists"),
                retry_at: None,
            }),
        )
            .into_response();
    }

    let session = Session::new(session_id.clone(), identity.tenant_id.clone(), body.subject_id);
    match state.launcher.launch(session, body.context).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(CreateSessionResponse {
                session_id: session_id.0,
            }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /v1/sessions/{key}/join
pub async fn post_join(
    State(state): State<GatewayState>,
    Path(key): Path<String>,
    Extension(identity): Extension<AgentIdentity>,
    body: Option<Json<JoinBody>>,
) -> Response {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    match state
        .arbiter
        .join(
            &SessionId(key),
            &identity,
            JoinRequest {
                reason: body.reason,
                opening_message: body.opening_message,
            },
        )
        .await
    {
        Ok(control) => (StatusCode::OK, Json(ControlResponse::from(control))).into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /v1/sessions/{key}/leave
pub async fn post_leave(
    State(state): State<GatewayState>,
    Path(key): Path<String>,
    Extension(identity): Extension<AgentIdentity>,
    body: Option<Json<LeaveBody>>,
) -> Response {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    match state
        .arbiter
        .leave(
            &SessionId(key),
            &identity,
            LeaveRequest {
                summary: body.summary,
                next_steps: body.next_steps,
            },
        )
        .await
    {
        Ok(control) => (StatusCode::OK, Json(ControlResponse::from(control))).into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /v1/sessions/{key}/message
///
/// Rate-limited per tenant and subject before the send is attempted: a
/// denied request never reaches the transport.
pub async fn post_message(
    State(state): State<GatewayState>,
    Path(key): Path<String>,
    Extension(identity): Extension<AgentIdentity>,
    Json(body): Json<MessageBody>,
) -> Response {
    let session_id = SessionId(key);

    let subject_id = match state.arbiter.status(&session_id, &identity).await {
        Ok(status) => status.session.subject_id,
        Err(err) => return error_response(err),
    };
    let decision = state
        .limiter
        .allow_message(&identity.tenant_id, &subject_id)
        .await;
    if !decision.allowed {
        return error_response(SwitchboardError::RateLimitExceeded {
            reset_at: decision.reset_at,
        });
    }

    match state
        .arbiter
        .send_as_human(&session_id, &identity, body.message)
        .await
    {
        Ok(receipt) => (
            StatusCode::OK,
            Json(SendResponse {
                delivery_id: receipt.delivery_id,
                status: receipt.status.to_string(),
            }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /v1/sessions/{key}
pub async fn get_status(
    State(state): State<GatewayState>,
    Path(key): Path<String>,
    Extension(identity): Extension<AgentIdentity>,
) -> Response {
    let session_id = SessionId(key);
    match state.arbiter.status(&session_id, &identity).await {
        Ok(status) => (
            StatusCode::OK,
            Json(StatusResponse {
                session_id: status.session.session_id.0.clone(),
                control_owner: status.session.control_owner.to_string(),
                under_control: status.under_control,
                controlling_agent: status.control.as_ref().map(|c| c.agent_id.clone()),
                queued_messages: status
                    .control
                    .as_ref()
                    .map(|c| c.queued_messages.iter().filter(|m| !m.processed).count())
                    .unwrap_or(0),
                observers: state.hub.observer_count(&session_id),
                last_activity_at: status.session.last_activity_at.to_rfc3339(),
            }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /v1/sessions/{key}/queue
pub async fn get_queue(
    State(state): State<GatewayState>,
    Path(key): Path<String>,
    Extension(identity): Extension<AgentIdentity>,
) -> Response {
    match state.arbiter.queue(&SessionId(key), &identity).await {
        Ok(messages) => (
            StatusCode::OK,
            Json(QueueResponse {
                messages: messages.into_iter().map(QueueEntry::from).collect(),
            }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /v1/sessions/{key}/queue/processed
pub async fn post_processed(
    State(state): State<GatewayState>,
    Path(key): Path<String>,
    Extension(identity): Extension<AgentIdentity>,
    Json(body): Json<ProcessedBody>,
) -> Response {
    match state
        .arbiter
        .mark_processed(&SessionId(key), &identity, body.message_ids)
        .await
    {
        Ok(processed) => {
            (StatusCode::OK, Json(ProcessedResponse { processed })).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// GET /health (unauthenticated, for liveness probes)
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.arbiter.active_sessions(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_body_deserializes_empty_object() {
        let body: JoinBody = serde_json::from_str("{}").unwrap();
        assert!(body.reason.is_none());
        assert!(body.opening_message.is_none());
    }

    #[test]
    fn join_body_deserializes_with_fields() {
        let json = r#"{"reason": "escalation", "opening_message": "Hi, Alice here"}"#;
        let body: JoinBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.reason.as_deref(), Some("escalation"));
        assert_eq!(body.opening_message.as_deref(), Some("Hi, Alice here"));
    }

    #[test]
    fn rate_limit_error_carries_retry_time() {
        let reset_at = chrono::Utc::now();
        let response = error_response(SwitchboardError::RateLimitExceeded { reset_at });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn cross_tenant_error_reads_as_not_found() {
        let response = error_response(SwitchboardError::CrossTenantAccess {
            expected: "tenant-a".into(),
            actual: "tenant-b".into(),
        });
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn error_response_skips_absent_retry() {
        let body = ErrorResponse {
            error: "nope".into(),
            retry_at: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("retry_at"));
    }
}
