//! Batch outcome metrics
//!
//! Prometheus series per batch, plus an in-memory aggregate for the end-of-run
//! summary.

use std::collections::BTreeMap;
use std::fmt;

use contracts::BatchOutcome;
use metrics::{counter, histogram};

/// Record one batch outcome
///
/// # Example
///
/// ```ignore
/// let outcome = pipeline.process(batch_id, reader, &store).await;
/// observability::metrics::record_batch_outcome(&outcome);
/// ```
pub fn record_batch_outcome(outcome: &BatchOutcome) {
    let status = match outcome.error_class() {
        None => "committed",
        Some(class) => class.as_str(),
    };
    counter!("ruuvi_ingest_batches_total", "status" => status).increment(1);

    counter!("ruuvi_ingest_envelopes_decoded_total").increment(outcome.decoded);
    counter!("ruuvi_ingest_readings_parsed_total").increment(outcome.parsed);
    counter!("ruuvi_ingest_rows_persisted_total").increment(outcome.persisted);

    let skipped = &outcome.skipped;
    for (reason, count) in [
        ("malformed_envelope", skipped.malformed_envelope),
        ("payload_parse", skipped.payload_parse),
        ("unresolved_device", skipped.unresolved_device),
    ] {
        if count > 0 {
            counter!("ruuvi_ingest_records_skipped_total", "reason" => reason).increment(count);
        }
    }

    histogram!("ruuvi_ingest_batch_duration_ms").record(outcome.duration.as_secs_f64() * 1000.0);
}

/// Aggregates outcomes of a multi-batch run
#[derive(Debug, Clone, Default)]
pub struct BatchMetricsAggregator {
    pub batches: u64,
    pub failed_batches: u64,
    pub decoded: u64,
    pub parsed: u64,
    pub persisted: u64,
    pub skipped_malformed: u64,
    pub skipped_parse: u64,
    pub skipped_unresolved: u64,

    /// Failed batches per error class
    pub failures: BTreeMap<&'static str, u64>,

    pub duration_ms: RunningStats,
}

impl BatchMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, outcome: &BatchOutcome) {
        self.batches += 1;
        self.decoded += outcome.decoded;
        self.parsed += outcome.parsed;
        self.persisted += outcome.persisted;
        self.skipped_malformed += outcome.skipped.malformed_envelope;
        self.skipped_parse += outcome.skipped.payload_parse;
        self.skipped_unresolved += outcome.skipped.unresolved_device;

        if let Some(class) = outcome.error_class() {
            self.failed_batches += 1;
            *self.failures.entry(class.as_str()).or_insert(0) += 1;
        }

        self.duration_ms
            .push(outcome.duration.as_secs_f64() * 1000.0);
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            batches: self.batches,
            failed_batches: self.failed_batches,
            decoded: self.decoded,
            parsed: self.parsed,
            persisted: self.persisted,
            skipped: self.skipped_malformed + self.skipped_parse + self.skipped_unresolved,
            failure_rate: if self.batches > 0 {
                self.failed_batches as f64 / self.batches as f64 * 100.0
            } else {
                0.0
            },
            failures: self.failures.clone(),
            duration_ms: StatsSummary::from(&self.duration_ms),
        }
    }
}

/// Summary of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub batches: u64,
    pub failed_batches: u64,
    pub decoded: u64,
    pub parsed: u64,
    pub persisted: u64,
    pub skipped: u64,
    pub failure_rate: f64,
    pub failures: BTreeMap<&'static str, u64>,
    pub duration_ms: StatsSummary,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Ingest Summary ===")?;
        writeln!(
            f,
            "Batches: {} ({} failed, {:.2}%)",
            self.batches, self.failed_batches, self.failure_rate
        )?;
        writeln!(f, "Envelopes decoded: {}", self.decoded)?;
        writeln!(f, "Readings parsed: {}", self.parsed)?;
        writeln!(f, "Rows persisted: {}", self.persisted)?;
        writeln!(f, "Records skipped: {}", self.skipped)?;
        writeln!(f, "Batch duration (ms): {}", self.duration_ms)?;

        if !self.failures.is_empty() {
            writeln!(f, "Failures by class:")?;
            for (class, count) in &self.failures {
                writeln!(f, "  {class}: {count}")?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DecodeError, SkipCounts, StorageError};
    use std::time::Duration;

    fn outcome(decoded: u64, persisted: u64) -> BatchOutcome {
        BatchOutcome {
            decoded,
            parsed: decoded,
            persisted,
            duration: Duration::from_millis(20),
            ..BatchOutcome::new("b")
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }
        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);

        let summary = StatsSummary::from(&stats);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 5.0);
    }

    #[test]
    fn test_aggregator_counts_failures_by_class() {
        let mut aggregator = BatchMetricsAggregator::new();
        aggregator.update(&outcome(3, 3));

        let mut decode_failure = outcome(0, 0);
        decode_failure.container_error = Some(DecodeError::header("bad magic"));
        aggregator.update(&decode_failure);

        let mut storage_failure = outcome(2, 0);
        storage_failure.skipped = SkipCounts {
            payload_parse: 1,
            ..SkipCounts::default()
        };
        storage_failure.batch_error = Some(StorageError::connection("gone").into());
        aggregator.update(&storage_failure);

        let summary = aggregator.summary();
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.failed_batches, 2);
        assert_eq!(summary.decoded, 5);
        assert_eq!(summary.persisted, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failures.get("decode"), Some(&1));
        assert_eq!(summary.failures.get("storage"), Some(&1));
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = BatchMetricsAggregator::new();
        aggregator.update(&outcome(4, 4));
        let output = aggregator.summary().to_string();
        assert!(output.contains("Batches: 1 (0 failed, 0.00%)"));
        assert!(output.contains("Rows persisted: 4"));
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_batch_outcome(&outcome(1, 1));
    }
}
