//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{IngestConfig, UnresolvedDevicePolicy};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    database: String,
    telemetry_table: String,
    device_table: String,
    unresolved_device: UnresolvedDevicePolicy,
    concurrency: usize,
    pool_size: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    database: describe_database(&config),
                    telemetry_table: config.schema.telemetry_table.clone(),
                    device_table: config.schema.device_table.clone(),
                    unresolved_device: config.pipeline.unresolved_device,
                    concurrency: config.pipeline.concurrency,
                    pool_size: config.database.pool_size,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Never prints credentials
fn describe_database(config: &IngestConfig) -> String {
    match config.database.url {
        Some(_) => "<url>".to_string(),
        None => format!(
            "{}@{}:{}/{}",
            config.database.user, config.database.host, config.database.port, config.database.dbname
        ),
    }
}

/// Non-fatal issues
fn collect_warnings(config: &IngestConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.pipeline.concurrency > config.database.pool_size {
        warnings.push(format!(
            "pipeline.concurrency ({}) exceeds database.pool_size ({}); batches will wait for connections",
            config.pipeline.concurrency, config.database.pool_size
        ));
    }

    if config.database.url.is_none() && config.database.password.is_empty() {
        warnings.push("database.password is empty".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Database: {}", summary.database);
            println!("  Telemetry table: {}", summary.telemetry_table);
            println!("  Device table: {}", summary.device_table);
            println!("  Unresolved devices: {:?}", summary.unresolved_device);
            println!("  Concurrency: {}", summary.concurrency);
            println!("  Pool size: {}", summary.pool_size);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {warning}");
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
    }
}
