// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vigil - crisis alert escalation and session engine.
//!
//! This is the binary entry point for the Vigil service.

mod doctor;
mod generator;
mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Vigil - crisis alert escalation and session engine.
#[derive(Parser, Debug)]
#[command(name = "vigil", version, about, long_about = None)]
struct Cli {
    /// Path to a specific config file (bypasses the XDG hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the engine with the console transport.
    Serve,
    /// Probe config, storage, and classifier health.
    Doctor,
    /// Show open alerts, live sessions, and pending timers.
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            vigil_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) | None => serve::run_serve(config).await,
        Some(Commands::Doctor) => doctor::run_doctor(config).await,
        Some(Commands::Status) => status::run_status(config).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn load_config(
    path: Option<&std::path::Path>,
) -> Result<vigil_config::VigilConfig, Vec<vigil_config::ConfigError>> {
    match path {
        Some(path) => {
            let config = vigil_config::load_config_from_path(path)
                .map_err(|e| vec![vigil_config::ConfigError::Other(e.to_string())])?;
            vigil_config::validation::validate_config(&config)?;
            Ok(config)
        }
        None => vigil_config::load_and_validate(),
    }
}
