//! Single-batch orchestration: decode, map, parse, then persist once.

use std::io::Read;
use std::time::Instant;

use contracts::{
    BatchOutcome, DecodeError, PipelineSettings, SensorReading, SkipCounts, TelemetryStore,
    UnresolvedDevicePolicy,
};
use ingestion::{EntryError, EnvelopeStream};
use persistence::BatchPersister;
use tracing::{debug, error, info, instrument, warn};

/// Readings materialized from one container
#[derive(Debug, Clone, Default)]
pub struct DecodedBatch {
    /// Container entries decoded (mapped or not)
    pub decoded: u64,
    pub readings: Vec<SensorReading>,
    /// Mapping and parsing skips; `unresolved_device` is always 0 here
    pub skipped: SkipCounts,
    /// Set when the container was abandoned; `readings` must not be persisted
    pub container_error: Option<DecodeError>,
}

/// Drives one delivered byte stream through the pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchPipeline {
    persister: BatchPersister,
    dry_run: bool,
}

impl BatchPipeline {
    pub fn new(policy: UnresolvedDevicePolicy) -> Self {
        Self {
            persister: BatchPersister::new(policy),
            dry_run: false,
        }
    }

    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self::new(settings.unresolved_device)
    }

    /// Decode and parse only; storage is never touched
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Materialize the readings of one container
    ///
    /// Record-level failures are counted and skipped. A container failure
    /// stops decoding immediately.
    pub fn decode<R: Read>(&self, batch_id: &str, reader: R) -> DecodedBatch {
        let mut batch = DecodedBatch::default();

        let mut stream = match EnvelopeStream::open(reader) {
            Ok(stream) => stream,
            Err(e) => {
                error!(batch_id, error = %e, "container header rejected");
                batch.container_error = Some(e);
                return batch;
            }
        };

        for item in stream.by_ref() {
            let envelope = match item {
                Ok(envelope) => envelope,
                Err(EntryError::Decode(e)) => {
                    error!(batch_id, error = %e, "container corrupt, abandoning batch");
                    batch.container_error = Some(e);
                    break;
                }
                Err(EntryError::Malformed { index, source }) => {
                    warn!(batch_id, entry_index = index, error = %source, "malformed envelope skipped");
                    batch.skipped.malformed_envelope += 1;
                    continue;
                }
            };

            match telemetry_parser::parse_envelope(&envelope) {
                Ok(reading) => batch.readings.push(reading),
                Err(e) => {
                    warn!(
                        batch_id,
                        sequence_number = envelope.sequence_number,
                        error = %e,
                        "payload skipped"
                    );
                    batch.skipped.payload_parse += 1;
                }
            }
        }

        batch.decoded = stream.entries_read();
        batch
    }

    /// Process one delivered byte stream end to end
    #[instrument(name = "batch_pipeline_process", skip(self, reader, store), fields(store = store.name()))]
    pub async fn process<R, S>(&self, batch_id: &str, reader: R, store: &S) -> BatchOutcome
    where
        R: Read,
        S: TelemetryStore + Sync,
        S::Transaction: Send,
    {
        let started = Instant::now();
        let decoded = self.decode(batch_id, reader);
        self.persist_decoded(batch_id, decoded, store, started).await
    }

    /// Persist a container decoded elsewhere; `started` anchors the duration
    pub async fn persist_decoded<S>(
        &self,
        batch_id: &str,
        decoded: DecodedBatch,
        store: &S,
        started: Instant,
    ) -> BatchOutcome
    where
        S: TelemetryStore + Sync,
        S::Transaction: Send,
    {
        let mut outcome = BatchOutcome::new(batch_id);
        outcome.decoded = decoded.decoded;
        outcome.parsed = decoded.readings.len() as u64;
        outcome.skipped = decoded.skipped;

        if decoded.container_error.is_some() {
            outcome.container_error = decoded.container_error;
        } else if self.dry_run {
            debug!(readings = decoded.readings.len(), "dry run, persistence skipped");
        } else {
            let summary = self
                .persister
                .persist(store, batch_id, &decoded.readings)
                .await;
            outcome.persisted = summary.inserted;
            outcome.skipped.unresolved_device = summary.skipped;
            outcome.batch_error = summary.error;
        }

        outcome.duration = started.elapsed();
        log_outcome(&outcome);
        outcome
    }
}

fn log_outcome(outcome: &BatchOutcome) {
    if outcome.failed() {
        error!(
            batch_id = %outcome.batch_id,
            decoded = outcome.decoded,
            parsed = outcome.parsed,
            persisted = outcome.persisted,
            skipped = outcome.skipped_total(),
            class = outcome.error_class().map(|c| c.as_str()),
            error = %outcome.error_message().unwrap_or_default(),
            "batch failed"
        );
    } else {
        info!(
            batch_id = %outcome.batch_id,
            decoded = outcome.decoded,
            parsed = outcome.parsed,
            persisted = outcome.persisted,
            skipped = outcome.skipped_total(),
            duration_ms = outcome.duration.as_millis() as u64,
            "batch processed"
        );
    }
}
