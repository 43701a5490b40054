//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ruuvi-ingest - Ruuvi/BLE telemetry capture ingestion
#[derive(Parser, Debug)]
#[command(
    name = "ruuvi-ingest",
    author,
    version,
    about = "Ingest Ruuvi telemetry capture files into PostgreSQL",
    long_about = "Decodes event-hub capture containers, parses the Ruuvi telemetry carried \n\
                  in each envelope and persists every container as one all-or-nothing \n\
                  batch of device readings."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "RUUVI_INGEST_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "RUUVI_INGEST_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Persist capture containers, one batch per file
    Run(RunArgs),

    /// Print the envelopes of one capture container
    Inspect(InspectArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Capture files or directories (directories expand to their *.avro files)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Path to configuration file (TOML or JSON); defaults apply when omitted
    #[arg(short, long, env = "RUUVI_INGEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the database URL from configuration
    #[arg(long, env = "RUUVI_INGEST_DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Override the number of batches processed concurrently
    #[arg(long, env = "RUUVI_INGEST_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Decode and parse only, never touch storage
    #[arg(long)]
    pub dry_run: bool,

    /// Prometheus metrics port (overrides configuration)
    #[arg(long, env = "RUUVI_INGEST_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for the `inspect` command
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Capture container to read
    pub path: PathBuf,

    /// Output entries as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Also parse each body into a sensor reading
    #[arg(long)]
    pub parse: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml", env = "RUUVI_INGEST_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for contracts::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => contracts::LogFormat::Json,
            LogFormat::Pretty => contracts::LogFormat::Pretty,
            LogFormat::Compact => contracts::LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::try_parse_from([
            "ruuvi-ingest",
            "-v",
            "run",
            "--dry-run",
            "--concurrency",
            "8",
            "a.avro",
            "captures/",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.dry_run);
        assert_eq!(args.concurrency, Some(8));
        assert_eq!(args.paths.len(), 2);
    }

    #[test]
    fn test_run_requires_paths() {
        assert!(Cli::try_parse_from(["ruuvi-ingest", "run"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["ruuvi-ingest", "-q", "-v", "validate"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
