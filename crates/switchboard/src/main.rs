// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Switchboard - conversation session orchestrator with human takeover.
//!
//! Binary entry point: loads and validates configuration, then
//! dispatches to the chosen subcommand.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod config_cmd;
mod launcher;
mod serve;
mod shutdown;
mod status;
mod tasks;

use clap::{Parser, Subcommand};

/// Switchboard - conversation session orchestrator with human takeover.
#[derive(Parser, Debug)]
#[command(name = "switchboard", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the orchestrator: bridge, arbiter, hub, and gateway.
    Serve,
    /// Query a running orchestrator's health endpoint.
    Status {
        /// Emit machine-readable JSON instead of formatted text.
        #[arg(long)]
        json: bool,
    },
    /// Print the resolved configuration with secrets redacted.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup.
    let config = match switchboard_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            switchboard_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Status { json }) => status::run_status(&config, json).await,
        Some(Commands::Config) => config_cmd::run_config(&config),
        None => {
            println!("switchboard: use --help for available commands");
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
