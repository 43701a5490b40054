use std::time::Duration;

use contracts::BatchOutcome;
use observability::{BatchMetricsAggregator, RunSummary};

/// Results of a multi-batch run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// One outcome per delivered batch, in delivery order
    pub outcomes: Vec<BatchOutcome>,
    pub metrics: BatchMetricsAggregator,
    /// Wall-clock time of the whole run
    pub duration: Duration,
}

impl RunStats {
    pub fn new(outcomes: Vec<BatchOutcome>, duration: Duration) -> Self {
        let mut metrics = BatchMetricsAggregator::new();
        for outcome in &outcomes {
            metrics.update(outcome);
        }
        Self {
            outcomes,
            metrics,
            duration,
        }
    }

    pub fn any_failed(&self) -> bool {
        self.metrics.failed_batches > 0
    }

    pub fn failed_batches(&self) -> u64 {
        self.metrics.failed_batches
    }

    pub fn summary(&self) -> RunSummary {
        self.metrics.summary()
    }

    pub fn print_summary(&self) {
        println!();
        print!("{}", self.summary());
        println!("Wall time: {:.2}s", self.duration.as_secs_f64());

        let failed: Vec<_> = self.outcomes.iter().filter(|o| o.failed()).collect();
        if !failed.is_empty() {
            println!("Failed batches:");
            for outcome in failed {
                println!(
                    "  {}: {}",
                    outcome.batch_id,
                    outcome.error_message().unwrap_or_default()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::DecodeError;

    #[test]
    fn test_aggregates_outcomes() {
        let mut ok = BatchOutcome::new("ok");
        ok.decoded = 3;
        ok.parsed = 3;
        ok.persisted = 3;

        let mut bad = BatchOutcome::new("bad");
        bad.container_error = Some(DecodeError::header("not a container"));

        let stats = RunStats::new(vec![ok, bad], Duration::from_millis(5));
        assert!(stats.any_failed());
        assert_eq!(stats.failed_batches(), 1);
        assert_eq!(stats.summary().persisted, 3);
        assert_eq!(stats.summary().failures.get("decode"), Some(&1));
    }
}
