//! # ruuvi-ingest
//!
//! Command-line entry point.
//!
//! - `run`: persist capture containers as telemetry batches
//! - `inspect`: dump the envelopes of one container
//! - `validate`: check a configuration file

mod cli;
mod commands;
mod error;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_ingest, run_inspect, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "ruuvi-ingest starting");

    let result = match &cli.command {
        Commands::Run(args) => run_ingest(args).await,
        Commands::Inspect(args) => run_inspect(args),
        Commands::Validate(args) => run_validate(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Logging from the global flags; the Prometheus exporter is installed by `run`
fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: level.to_string(),
    })
}
