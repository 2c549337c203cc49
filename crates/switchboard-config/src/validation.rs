// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: positive timing values, sane backoff parameters, a
//! bindable gateway address.

use crate::diagnostic::ConfigError;
use crate::model::SwitchboardConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or all collected
/// validation errors (does not fail fast).
pub fn validate_config(config: &SwitchboardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.upstream.reconnect_max_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "upstream.reconnect_max_attempts must be at least 1".to_string(),
        });
    }

    if config.upstream.reconnect_multiplier < 1.0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "upstream.reconnect_multiplier must be >= 1.0, got {}",
                config.upstream.reconnect_multiplier
            ),
        });
    }

    if config.upstream.reconnect_base_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "upstream.reconnect_base_ms must be positive".to_string(),
        });
    }

    if config.control.inactivity_timeout_mins == 0 {
        errors.push(ConfigError::Validation {
            message: "control.inactivity_timeout_mins must be positive".to_string(),
        });
    }

    if config.control.session_idle_timeout_mins == 0 {
        errors.push(ConfigError::Validation {
            message: "control.session_idle_timeout_mins must be positive".to_string(),
        });
    }

    if config.control.sweep_interval_mins == 0 {
        errors.push(ConfigError::Validation {
            message: "control.sweep_interval_mins must be positive".to_string(),
        });
    }

    if config.control.sweep_interval_mins > config.control.inactivity_timeout_mins {
        errors.push(ConfigError::Validation {
            message: format!(
                "control.sweep_interval_mins ({}) must not exceed control.inactivity_timeout_mins ({})",
                config.control.sweep_interval_mins, config.control.inactivity_timeout_mins
            ),
        });
    }

    if config.hub.liveness_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "hub.liveness_interval_secs must be positive".to_string(),
        });
    }

    if config.hub.observer_buffer == 0 {
        errors.push(ConfigError::Validation {
            message: "hub.observer_buffer must be positive".to_string(),
        });
    }

    if config.store.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "store.database_path must not be empty".to_string(),
        });
    }

    if config.store.event_log_cap == 0 {
        errors.push(ConfigError::Validation {
            message: "store.event_log_cap must be positive".to_string(),
        });
    }

    for (name, window) in [
        ("limits.message_window_secs", config.limits.message_window_secs),
        ("limits.call_window_secs", config.limits.call_window_secs),
    ] {
        if window == 0 {
            errors.push(ConfigError::Validation {
                message: format!("{name} must be positive"),
            });
        }
    }

    let addr = config.gateway.host.trim();
    if addr.is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = addr.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = addr
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("gateway.host `{addr}` is not a valid IP address or hostname"),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
