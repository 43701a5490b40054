//! `run` command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use contracts::{IngestConfig, TelemetryStore};
use persistence::{InMemoryTelemetryStore, PostgresTelemetryStore};
use pipeline::{run_batches, BatchPipeline, DeliveredBatch, RunStats};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;

const CAPTURE_EXTENSION: &str = "avro";

/// Execute the `run` command
pub async fn run_ingest(args: &RunArgs) -> Result<()> {
    let config = load_config(args)?;

    let files = expand_paths(&args.paths)?;
    if files.is_empty() {
        return Err(CliError::NoInputs.into());
    }
    let batches: Vec<_> = files.into_iter().map(DeliveredBatch::from_file).collect();

    if let Some(port) = args.metrics_port.or(config.observability.metrics_port) {
        observability::init_metrics_only(port)?;
    }

    let concurrency = config.pipeline.concurrency;
    let pipeline = BatchPipeline::from_settings(&config.pipeline).with_dry_run(args.dry_run);

    info!(
        batches = batches.len(),
        concurrency,
        policy = ?config.pipeline.unresolved_device,
        dry_run = args.dry_run,
        "Starting ingest"
    );

    let total = batches.len();
    let stats = if args.dry_run {
        execute(pipeline, InMemoryTelemetryStore::new(), batches, concurrency).await?
    } else {
        let store = PostgresTelemetryStore::new(&config.database, &config.schema)
            .context("Failed to set up PostgreSQL store")?;
        execute(pipeline, store, batches, concurrency).await?
    };

    stats.print_summary();

    if stats.any_failed() {
        return Err(CliError::BatchesFailed {
            failed: stats.failed_batches(),
            total,
        }
        .into());
    }

    info!("ruuvi-ingest finished");
    Ok(())
}

async fn execute<S>(
    pipeline: BatchPipeline,
    store: S,
    batches: Vec<DeliveredBatch>,
    concurrency: usize,
) -> Result<RunStats>
where
    S: TelemetryStore + Send + Sync + 'static,
    S::Transaction: Send,
{
    tokio::select! {
        stats = run_batches(pipeline, store, batches, concurrency) => Ok(stats),
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, open transactions are discarded");
            Err(CliError::Interrupted.into())
        }
    }
}

/// Configuration file (or defaults) with CLI overrides applied
fn load_config(args: &RunArgs) -> Result<IngestConfig> {
    let mut config = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config_not_found(path).into());
            }
            info!(config = %path.display(), "Loading configuration");
            config_loader::ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => IngestConfig::default(),
    };

    if let Some(url) = &args.database_url {
        config.database.url = Some(url.clone());
    }
    if let Some(concurrency) = args.concurrency {
        info!(concurrency, "Overriding concurrency from CLI");
        config.pipeline.concurrency = concurrency;
    }

    config_loader::ConfigLoader::validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Files are taken as given; directories expand to their capture files, sorted
fn expand_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            for entry in std::fs::read_dir(path)
                .with_context(|| format!("Failed to read directory {}", path.display()))?
            {
                let entry_path = entry?.path();
                if entry_path.is_file() && is_capture_file(&entry_path) {
                    found.push(entry_path);
                }
            }
            found.sort();
            files.extend(found);
        } else if path.exists() {
            files.push(path.clone());
        } else {
            return Err(CliError::input_not_found(path).into());
        }
    }
    Ok(files)
}

fn is_capture_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(CAPTURE_EXTENSION))
}

/// Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
