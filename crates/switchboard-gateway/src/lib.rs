// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket control plane for the orchestrator.
//!
//! Agents join, message through, and leave live sessions over REST;
//! dashboards watch them over the `/ws` observer stream. Every
//! authenticated request carries an [`AgentIdentity`] the arbiter
//! checks against the session's tenant.
//!
//! [`AgentIdentity`]: switchboard_core::types::AgentIdentity

pub mod auth;
pub mod handlers;
pub mod launch;
pub mod server;
pub mod ws;

pub use auth::AuthConfig;
pub use launch::SessionLaunch;
pub use server::{router, start_server, GatewayState, ServerConfig};
