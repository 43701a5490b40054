//! Multi-batch runner
//!
//! Independent workers pull delivered batches from a shared queue. Each batch
//! gets its own store transaction; workers share nothing else. Containers are
//! decoded on the blocking pool so async workers only wait on storage.
//!
//! Workers live in a [`JoinSet`] owned by the run. Dropping an unfinished
//! [`run_batches`] future aborts them, and their open transactions roll back.

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use contracts::{BatchOutcome, DecodeError, TelemetryStore};
use observability::record_batch_outcome;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, instrument};

use crate::batch::{BatchPipeline, DecodedBatch};
use crate::stats::RunStats;

/// Where a delivered batch's bytes come from
#[derive(Debug, Clone)]
pub enum BatchSource {
    Bytes(Bytes),
    File(PathBuf),
}

/// One `(batch_id, byte_stream)` delivery
#[derive(Debug, Clone)]
pub struct DeliveredBatch {
    pub batch_id: String,
    pub source: BatchSource,
}

impl DeliveredBatch {
    pub fn from_bytes(batch_id: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            batch_id: batch_id.into(),
            source: BatchSource::Bytes(bytes.into()),
        }
    }

    /// Batch whose id is the file path
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            batch_id: path.display().to_string(),
            source: BatchSource::File(path),
        }
    }
}

/// Process one delivery
pub async fn process_delivered<S>(
    pipeline: &BatchPipeline,
    batch: DeliveredBatch,
    store: &S,
) -> BatchOutcome
where
    S: TelemetryStore + Sync,
    S::Transaction: Send,
{
    let started = Instant::now();
    let DeliveredBatch { batch_id, source } = batch;

    let decoder = *pipeline;
    let id = batch_id.clone();
    let decoded = match tokio::task::spawn_blocking(move || decode_source(&decoder, &id, source))
        .await
    {
        Ok(decoded) => decoded,
        Err(e) => failed_decode(&batch_id, e),
    };

    pipeline
        .persist_decoded(&batch_id, decoded, store, started)
        .await
}

/// Blocking: reads and decodes the whole container
fn decode_source(pipeline: &BatchPipeline, batch_id: &str, source: BatchSource) -> DecodedBatch {
    match source {
        BatchSource::Bytes(bytes) => pipeline.decode(batch_id, Cursor::new(bytes)),
        BatchSource::File(path) => match File::open(&path) {
            Ok(file) => pipeline.decode(batch_id, BufReader::new(file)),
            Err(e) => {
                error!(batch_id, error = %e, "cannot open batch file");
                DecodedBatch {
                    container_error: Some(DecodeError::header(format!(
                        "cannot open {}: {e}",
                        path.display()
                    ))),
                    ..DecodedBatch::default()
                }
            }
        },
    }
}

fn failed_decode(batch_id: &str, e: JoinError) -> DecodedBatch {
    error!(batch_id, error = %e, "decode task failed");
    DecodedBatch {
        container_error: Some(DecodeError::header(format!("decode task failed: {e}"))),
        ..DecodedBatch::default()
    }
}

/// Process `batches` with at most `concurrency` in flight
///
/// Outcomes are returned in delivery order.
#[instrument(
    name = "pipeline_run_batches",
    skip(pipeline, store, batches),
    fields(batches = batches.len(), store = store.name())
)]
pub async fn run_batches<S>(
    pipeline: BatchPipeline,
    store: S,
    batches: Vec<DeliveredBatch>,
    concurrency: usize,
) -> RunStats
where
    S: TelemetryStore + Send + Sync + 'static,
    S::Transaction: Send,
{
    let started = Instant::now();
    let workers = concurrency.clamp(1, batches.len().max(1));
    let store = Arc::new(store);

    let (job_tx, job_rx) = async_channel::bounded::<(usize, DeliveredBatch)>(workers);
    let (done_tx, done_rx) = async_channel::unbounded::<(usize, BatchOutcome)>();

    let mut pool = JoinSet::new();
    for worker in 0..workers {
        let job_rx = job_rx.clone();
        let done_tx = done_tx.clone();
        let store = Arc::clone(&store);
        pool.spawn(async move {
            while let Ok((index, batch)) = job_rx.recv().await {
                let outcome = process_delivered(&pipeline, batch, store.as_ref()).await;
                record_batch_outcome(&outcome);
                if done_tx.send((index, outcome)).await.is_err() {
                    break;
                }
            }
            tracing::debug!(worker, "worker finished");
        });
    }
    drop(job_rx);
    drop(done_tx);

    for job in batches.into_iter().enumerate() {
        if job_tx.send(job).await.is_err() {
            error!("all workers exited early");
            break;
        }
    }
    job_tx.close();

    let mut outcomes = Vec::new();
    while let Ok(done) = done_rx.recv().await {
        outcomes.push(done);
    }
    while let Some(joined) = pool.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "worker task failed");
        }
    }
    outcomes.sort_by_key(|(index, _)| *index);

    let stats = RunStats::new(
        outcomes.into_iter().map(|(_, outcome)| outcome).collect(),
        started.elapsed(),
    );
    info!(
        batches = stats.outcomes.len(),
        failed = stats.failed_batches(),
        duration_ms = stats.duration.as_millis() as u64,
        "run complete"
    );
    stats
}
