// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Switchboard orchestrator.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject
//! unrecognized config keys at startup. Every timing knob the
//! components read (backoff base/attempts, eviction timeout, liveness
//! interval, rate-limit windows) is enumerated here rather than
//! scattered as inline defaults.

use serde::{Deserialize, Serialize};

/// Top-level Switchboard configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with
/// environment variable overrides. All sections are optional and
/// default to the shipped values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchboardConfig {
    /// Orchestrator identity and logging.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Upstream realtime voice AI channel.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Human control arbitration.
    #[serde(default)]
    pub control: ControlConfig,

    /// Dashboard observer fan-out.
    #[serde(default)]
    pub hub: HubConfig,

    /// State store (SQLite) and event log retention.
    #[serde(default)]
    pub store: StoreConfig,

    /// Outbound action rate limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Control-plane HTTP/WebSocket gateway.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Orchestrator identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Display name used in logs and the status endpoint.
    #[serde(default = "default_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_name() -> String {
    "switchboard".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Upstream realtime channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// HTTPS endpoint issuing short-lived single-use connection tokens.
    /// Fetched fresh on every connection attempt.
    #[serde(default)]
    pub token_endpoint: Option<String>,

    /// API key presented to the token endpoint.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base reconnect delay in milliseconds.
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,

    /// Backoff multiplier between reconnect attempts.
    #[serde(default = "default_reconnect_multiplier")]
    pub reconnect_multiplier: f64,

    /// Maximum reconnect attempts before the conversation is ended
    /// with reason `upstream_unavailable`.
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            token_endpoint: None,
            api_key: None,
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_multiplier: default_reconnect_multiplier(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
        }
    }
}

fn default_reconnect_base_ms() -> u64 {
    1000
}

fn default_reconnect_multiplier() -> f64 {
    2.0
}

fn default_reconnect_max_attempts() -> u32 {
    5
}

/// Human control arbitration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ControlConfig {
    /// Minutes of agent inactivity before a control session is evicted.
    #[serde(default = "default_inactivity_timeout_mins")]
    pub inactivity_timeout_mins: u64,

    /// Minutes a whole conversation may sit idle, with no human
    /// attached, before the sweep tears it down.
    #[serde(default = "default_session_idle_timeout_mins")]
    pub session_idle_timeout_mins: u64,

    /// Minutes between inactivity sweep runs.
    #[serde(default = "default_sweep_interval_mins")]
    pub sweep_interval_mins: u64,

    /// Per-session actor mailbox depth.
    #[serde(default = "default_mailbox_depth")]
    pub mailbox_depth: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_mins: default_inactivity_timeout_mins(),
            session_idle_timeout_mins: default_session_idle_timeout_mins(),
            sweep_interval_mins: default_sweep_interval_mins(),
            mailbox_depth: default_mailbox_depth(),
        }
    }
}

fn default_inactivity_timeout_mins() -> u64 {
    120
}

fn default_session_idle_timeout_mins() -> u64 {
    1440
}

fn default_sweep_interval_mins() -> u64 {
    15
}

fn default_mailbox_depth() -> usize {
    256
}

/// Dashboard observer fan-out configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    /// Seconds between per-observer liveness messages.
    #[serde(default = "default_liveness_interval_secs")]
    pub liveness_interval_secs: u64,

    /// Bounded per-observer outbound buffer. A full buffer counts as a
    /// dead observer on the next publish.
    #[serde(default = "default_observer_buffer")]
    pub observer_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            liveness_interval_secs: default_liveness_interval_secs(),
            observer_buffer: default_observer_buffer(),
        }
    }
}

fn default_liveness_interval_secs() -> u64 {
    30
}

fn default_observer_buffer() -> usize {
    64
}

/// State store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Write retry attempts before surfacing a persistence error.
    #[serde(default = "default_write_retry_attempts")]
    pub write_retry_attempts: u32,

    /// Newest entries kept per conversation event log.
    #[serde(default = "default_event_log_cap")]
    pub event_log_cap: usize,

    /// Hours an event log survives without activity.
    #[serde(default = "default_event_log_ttl_hours")]
    pub event_log_ttl_hours: u64,

    /// Seconds between scheduled-task sweep polls.
    #[serde(default = "default_task_poll_secs")]
    pub task_poll_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            write_retry_attempts: default_write_retry_attempts(),
            event_log_cap: default_event_log_cap(),
            event_log_ttl_hours: default_event_log_ttl_hours(),
            task_poll_secs: default_task_poll_secs(),
        }
    }
}

fn default_database_path() -> String {
    "switchboard.db".to_string()
}

fn default_write_retry_attempts() -> u32 {
    5
}

fn default_event_log_cap() -> usize {
    100
}

fn default_event_log_ttl_hours() -> u64 {
    48
}

fn default_task_poll_secs() -> u64 {
    5
}

/// Outbound action rate limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Max outbound messages per subject inside the message window.
    #[serde(default = "default_messages_per_window")]
    pub messages_per_window: u64,

    /// Message window length in seconds.
    #[serde(default = "default_message_window_secs")]
    pub message_window_secs: u64,

    /// Max outbound calls per subject inside the call window.
    #[serde(default = "default_calls_per_window")]
    pub calls_per_window: u64,

    /// Call window length in seconds.
    #[serde(default = "default_call_window_secs")]
    pub call_window_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            messages_per_window: default_messages_per_window(),
            message_window_secs: default_message_window_secs(),
            calls_per_window: default_calls_per_window(),
            call_window_secs: default_call_window_secs(),
        }
    }
}

fn default_messages_per_window() -> u64 {
    30
}

fn default_message_window_secs() -> u64 {
    3600
}

fn default_calls_per_window() -> u64 {
    5
}

fn default_call_window_secs() -> u64 {
    3600
}

/// Control-plane gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for control-plane auth (None = all requests rejected).
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8380
}
