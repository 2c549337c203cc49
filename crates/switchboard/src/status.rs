// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard status` command implementation.
//!
//! Connects to the gateway health endpoint to display orchestrator
//! state, uptime, and active session count. Falls back gracefully when
//! the orchestrator is not running.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use switchboard_config::model::SwitchboardConfig;
use switchboard_core::SwitchboardError;

/// Health endpoint response from the gateway.
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    uptime_secs: u64,
    active_sessions: usize,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub running: bool,
    pub status: String,
    pub uptime_secs: Option<u64>,
    pub uptime_human: Option<String>,
    pub active_sessions: Option<usize>,
    pub gateway_host: String,
    pub gateway_port: u16,
}

/// Format seconds into a human-readable duration string.
fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Run the `switchboard status` command.
pub async fn run_status(config: &SwitchboardConfig, json: bool) -> Result<(), SwitchboardError> {
    let host = &config.gateway.host;
    let port = config.gateway.port;
    let url = format!("http://{host}:{port}/health");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| SwitchboardError::Internal(format!("failed to create HTTP client: {e}")))?;

    let report = match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            let health: HealthResponse = resp.json().await.map_err(|e| {
                SwitchboardError::Internal(format!("failed to parse health response: {e}"))
            })?;
            StatusReport {
                running: true,
                status: health.status,
                uptime_secs: Some(health.uptime_secs),
                uptime_human: Some(format_uptime(health.uptime_secs)),
                active_sessions: Some(health.active_sessions),
                gateway_host: host.clone(),
                gateway_port: port,
            }
        }
        _ => StatusReport {
            running: false,
            status: "not running".to_string(),
            uptime_secs: None,
            uptime_human: None,
            active_sessions: None,
            gateway_host: host.clone(),
            gateway_port: port,
        },
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &StatusReport) {
    println!();
    println!("  switchboard status");
    println!("  {}", "-".repeat(35));
    if report.running {
        println!(
            "    State:     [OK] {} (uptime: {})",
            report.status,
            report.uptime_human.as_deref().unwrap_or("-"),
        );
        println!(
            "    Sessions:  {}",
            report.active_sessions.unwrap_or(0)
        );
    } else {
        println!("    State:     [FAIL] not running");
        println!(
            "    Endpoint:  http://{}:{}/health",
            report.gateway_host, report.gateway_port
        );
        println!();
        println!("  Start with: switchboard serve");
    }
    println!();
}
