//! labgate - two-door NFC access point
//!
//! # Usage
//!
//! ```bash
//! # Run with config/labgate.toml
//! labgate
//!
//! # Run with another file
//! labgate --config /etc/labgate.toml run
//! LABGATE_CONFIG=/etc/labgate.toml labgate run
//!
//! # Validate a file and print the effective configuration
//! labgate --config /etc/labgate.toml check-config
//!
//! # Debug logging
//! RUST_LOG=labgate_reader=debug labgate
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use labgate_cli::{AppConfig, resolve_config_path, telemetry};
use std::path::PathBuf;

/// Two-door NFC access point
#[derive(Parser, Debug)]
#[command(name = "labgate", version, about)]
struct Args {
    /// Configuration file [default: config/labgate.toml]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the access point until SIGINT/SIGTERM/SIGQUIT
    Run,
    /// Validate the configuration and print it with defaults filled in
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let path = resolve_config_path(args.config);
    let config = AppConfig::from_file(&path)?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            telemetry::init(config.log.json)?;
            tracing::info!(config = %path.display(), "Configuration loaded");
            let report = labgate_cli::run(config).await?;
            if !report.is_clean() {
                tracing::warn!(
                    panicked = report.panicked,
                    aborted = report.cancelled,
                    "Some tasks did not stop cleanly"
                );
            }
            Ok(())
        }
        Command::CheckConfig => {
            println!("# {}", path.display());
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
