// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard config` command implementation.
//!
//! Prints the fully-resolved configuration (defaults, files, and env
//! merged) as TOML, with secret values redacted.

use switchboard_config::model::SwitchboardConfig;
use switchboard_core::SwitchboardError;

const REDACTED: &str = "[redacted]";

/// Run the `switchboard config` command.
pub fn run_config(config: &SwitchboardConfig) -> Result<(), SwitchboardError> {
    let rendered = render(config)?;
    println!("{rendered}");
    Ok(())
}

/// Serialize the config with secrets replaced.
fn render(config: &SwitchboardConfig) -> Result<String, SwitchboardError> {
    let mut shown = config.clone();
    if shown.upstream.api_key.is_some() {
        shown.upstream.api_key = Some(REDACTED.to_string());
    }
    if shown.gateway.bearer_token.is_some() {
        shown.gateway.bearer_token = Some(REDACTED.to_string());
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| SwitchboardError::Internal(format!("failed to render config: {e}")))
}
