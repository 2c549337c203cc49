// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./switchboard.toml` >
//! `~/.config/switchboard/switchboard.toml` >
//! `/etc/switchboard/switchboard.toml` with environment variable
//! overrides via the `SWITCHBOARD_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::SwitchboardConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/switchboard/switchboard.toml` (system-wide)
/// 3. `~/.config/switchboard/switchboard.toml` (user XDG config)
/// 4. `./switchboard.toml` (local directory)
/// 5. `SWITCHBOARD_*` environment variables
pub fn load_config() -> Result<SwitchboardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SwitchboardConfig::default()))
        .merge(Toml::file("/etc/switchboard/switchboard.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("switchboard/switchboard.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("switchboard.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<SwitchboardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SwitchboardConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SwitchboardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SwitchboardConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity
/// with underscore-containing key names: `SWITCHBOARD_STORE_DATABASE_PATH`
/// must become `store.database_path`, not `store.database.path`.
fn env_provider() -> Env {
    Env::prefixed("SWITCHBOARD_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("orchestrator_", "orchestrator.", 1)
            .replacen("upstream_", "upstream.", 1)
            .replacen("control_", "control.", 1)
            .replacen("hub_", "hub.", 1)
            .replacen("store_", "store.", 1)
            .replacen("limits_", "limits.", 1)
            .replacen("gateway_", "gateway.", 1);
        mapped.into()
    })
}
