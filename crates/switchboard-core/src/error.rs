// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Switchboard orchestrator.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// The primary error type used across all Switchboard components.
#[derive(Debug, Error)]
pub enum SwitchboardError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Upstream channel errors (handshake failure, unclean close, token fetch).
    /// Retried per the bridge reconnect policy; terminal once retries exhaust.
    #[error("connection error: {message}")]
    Connection {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A join was attempted while another agent holds control.
    /// Returned to the caller, never retried.
    #[error("session {session_id} is already under control of agent {holder}")]
    AlreadyUnderControl { session_id: String, holder: String },

    /// A human-authored action was attempted with no active control session.
    #[error("session {session_id} is not under human control")]
    NotUnderControl { session_id: String },

    /// An event or request crossed a tenant boundary. Dropped and logged
    /// as a security event at the hub; never surfaced as data to the caller.
    #[error("cross-tenant access: expected tenant {expected}, got {actual}")]
    CrossTenantAccess { expected: String, actual: String },

    /// Durable-store write failed after retry exhaustion. Control-state
    /// transitions abort on this; broadcasts proceed degraded.
    #[error("persistence error: {source}")]
    Persistence {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Outbound action denied by the sliding-window rate limiter.
    #[error("rate limit exceeded, resets at {reset_at}")]
    RateLimitExceeded { reset_at: DateTime<Utc> },

    /// Session evicted by the inactivity sweep. System-initiated;
    /// logged and broadcast, not returned to any caller.
    #[error("session {session_id} evicted after inactivity timeout")]
    StaleSession { session_id: String },

    /// No live session exists for the given key.
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SwitchboardError {
    /// True for errors the caller caused and may correct; these are never retried.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyUnderControl { .. }
                | Self::NotUnderControl { .. }
                | Self::RateLimitExceeded { .. }
                | Self::SessionNotFound { .. }
        )
    }
}
