// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Switchboard configuration system.

use switchboard_config::diagnostic::ConfigError;
use switchboard_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_config() {
    let toml = r#"
[orchestrator]
name = "test-orchestrator"
log_level = "debug"

[upstream]
token_endpoint = "https://voice.example.com/token"
api_key = "sk-test-123"
reconnect_base_ms = 500
reconnect_max_attempts = 3

[control]
inactivity_timeout_mins = 60
sweep_interval_mins = 10

[hub]
liveness_interval_secs = 15
observer_buffer = 32

[store]
database_path = "/tmp/test.db"
event_log_cap = 50
event_log_ttl_hours = 24

[limits]
messages_per_window = 10
message_window_secs = 600

[gateway]
host = "0.0.0.0"
port = 9000
bearer_token = "secret"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.orchestrator.name, "test-orchestrator");
    assert_eq!(config.orchestrator.log_level, "debug");
    assert_eq!(
        config.upstream.token_endpoint.as_deref(),
        Some("https://voice.example.com/token")
    );
    assert_eq!(config.upstream.reconnect_base_ms, 500);
    assert_eq!(config.upstream.reconnect_max_attempts, 3);
    assert_eq!(config.control.inactivity_timeout_mins, 60);
    assert_eq!(config.control.sweep_interval_mins, 10);
    assert_eq!(config.hub.liveness_interval_secs, 15);
    assert_eq!(config.store.database_path, "/tmp/test.db");
    assert_eq!(config.store.event_log_cap, 50);
    assert_eq!(config.limits.messages_per_window, 10);
    assert_eq!(config.gateway.host, "0.0.0.0");
    assert_eq!(config.gateway.port, 9000);
    assert_eq!(config.gateway.bearer_token.as_deref(), Some("secret"));
}

/// Empty config falls back to compiled defaults.
#[test]
fn empty_config_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should deserialize");
    assert_eq!(config.orchestrator.name, "switchboard");
    assert_eq!(config.upstream.reconnect_base_ms, 1000);
    assert_eq!(config.upstream.reconnect_max_attempts, 5);
    assert_eq!(config.control.inactivity_timeout_mins, 120);
    assert_eq!(config.control.sweep_interval_mins, 15);
    assert_eq!(config.hub.liveness_interval_secs, 30);
    assert_eq!(config.store.event_log_cap, 100);
    assert_eq!(config.store.event_log_ttl_hours, 48);
    assert_eq!(config.gateway.port, 8380);
}

/// Unknown field in a section produces an UnknownKey error with a suggestion.
#[test]
fn unknown_field_produces_suggestion() {
    let toml = r#"
[upstream]
token_edpoint = "https://voice.example.com/token"
"#;

    let errors = load_and_validate_str(toml).expect_err("unknown key should fail");
    let found = errors.iter().any(|e| {
        matches!(
            e,
            ConfigError::UnknownKey { key, suggestion, .. }
                if key == "token_edpoint" && suggestion.as_deref() == Some("token_endpoint")
        )
    });
    assert!(found, "expected UnknownKey with suggestion, got {errors:?}");
}

/// A sweep interval longer than the inactivity timeout is rejected.
#[test]
fn sweep_interval_longer_than_timeout_is_rejected() {
    let toml = r#"
[control]
inactivity_timeout_mins = 10
sweep_interval_mins = 30
"#;

    let errors = load_and_validate_str(toml).expect_err("validation should fail");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::Validation { message }
            if message.contains("sweep_interval_mins"))));
}

/// Zero reconnect attempts is rejected at validation.
#[test]
fn zero_reconnect_attempts_rejected() {
    let toml = r#"
[upstream]
reconnect_max_attempts = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("validation should fail");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::Validation { message }
            if message.contains("reconnect_max_attempts"))));
}

/// Wrong value type surfaces as an InvalidType diagnostic.
#[test]
fn wrong_type_produces_invalid_type() {
    let toml = r#"
[gateway]
port = "not-a-number"
"#;

    let errors = load_and_validate_str(toml).expect_err("type error should fail");
    assert!(!errors.is_empty());
}
