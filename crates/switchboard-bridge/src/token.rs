// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-attempt authorization for the upstream channel.
//!
//! Connection tokens are single-use and short-lived, so every connect
//! attempt fetches a fresh grant instead of reusing a stale one.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use switchboard_core::SwitchboardError;

/// A single-use grant for one connection attempt.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionGrant {
    /// Signed WebSocket URL to connect to.
    pub signed_url: String,
    /// Token presented during the handshake.
    pub token: String,
}

/// Client for the secured token-issuing endpoint.
#[derive(Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl TokenClient {
    pub fn new(endpoint: String, api_key: String) -> Result<Self, SwitchboardError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SwitchboardError::Connection {
                message: format!("failed to build token HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }

    /// Fetch a fresh grant for `conversation_id`.
    pub async fn fetch(&self, conversation_id: &str) -> Result<ConnectionGrant, SwitchboardError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "conversation_id": conversation_id }))
            .send()
            .await
            .map_err(|e| SwitchboardError::Connection {
                message: format!("token endpoint unreachable: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SwitchboardError::Connection {
                message: format!("token endpoint returned {status}"),
                source: None,
            });
        }

        let grant: ConnectionGrant =
            response
                .json()
                .await
                .map_err(|e| SwitchboardError::Connection {
                    message: format!("malformed token response: {e}"),
                    source: Some(Box::new(e)),
                })?;

        debug!(conversation_id, "fetched fresh connection grant");
        Ok(grant)
    }
}
