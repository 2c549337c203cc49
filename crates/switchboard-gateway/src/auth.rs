// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication middleware for the control plane.
//!
//! Requests carry a bearer token (`Authorization: Bearer <token>`) plus
//! the identity headers the fronting auth layer verified:
//! `X-Tenant-Id`, `X-Agent-Id`, and optionally `X-Agent-Name`.
//!
//! When no bearer token is configured, all requests are rejected
//! (fail-closed). The tenant boundary itself is enforced deeper in, at
//! the control arbiter, so a stolen token scoped to one tenant still
//! cannot touch another tenant's sessions.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use switchboard_core::types::{AgentIdentity, TenantId};

/// Authentication configuration for the gateway.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected bearer token. `None` rejects everything.
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl AuthConfig {
    /// Check a presented token against the configured one.
    pub fn token_matches(&self, presented: &str) -> bool {
        self.bearer_token.as_deref() == Some(presented)
    }
}

/// Read the identity headers into an [`AgentIdentity`].
pub fn identity_from_headers(headers: &axum::http::HeaderMap) -> Option<AgentIdentity> {
    let tenant_id = headers.get("x-tenant-id")?.to_str().ok()?.to_string();
    let agent_id = headers.get("x-agent-id")?.to_str().ok()?.to_string();
    let agent_name = headers
        .get("x-agent-name")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(&agent_id)
        .to_string();
    if tenant_id.is_empty() || agent_id.is_empty() {
        return None;
    }
    Some(AgentIdentity {
        tenant_id: TenantId(tenant_id),
        agent_id,
        agent_name,
    })
}

/// Middleware validating the bearer token and attaching the caller's
/// [`AgentIdentity`] as a request extension.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // No token configured means nobody gets in (fail-closed).
    let Some(ref expected_token) = auth.bearer_token else {
        tracing::error!("gateway has no auth configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let presented = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match presented {
        Some(token) if token == expected_token => {}
        _ => return Err(StatusCode::UNAUTHORIZED),
    }

    let Some(identity) = identity_from_headers(request.headers()) else {
        return Err(StatusCode::BAD_REQUEST);
    };
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
