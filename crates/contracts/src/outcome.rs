//! Batch outcomes reported by the persister and the orchestrator

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::{DecodeError, DeviceResolutionError, ErrorClass, StorageError};

/// Error that made the persistence step discard the whole batch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Only raised under `UnresolvedDevicePolicy::FailBatch`
    #[error(transparent)]
    DeviceResolution(#[from] DeviceResolutionError),
}

impl BatchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Storage(_) => ErrorClass::Storage,
            Self::DeviceResolution(_) => ErrorClass::DeviceResolution,
        }
    }
}

/// Result of one transactional batch write
///
/// Durable rows exist iff `failed == false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistSummary {
    /// Rows committed (0 when the transaction was rolled back)
    pub inserted: u64,

    /// Readings skipped because their device did not resolve
    pub skipped: u64,

    /// Transaction rolled back
    pub failed: bool,

    /// Cause of the rollback
    pub error: Option<BatchError>,
}

impl PersistSummary {
    /// Summary of a rolled-back batch
    pub fn rolled_back(skipped: u64, error: BatchError) -> Self {
        Self {
            inserted: 0,
            skipped,
            failed: true,
            error: Some(error),
        }
    }
}

/// Per-reason counters of skipped records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub malformed_envelope: u64,
    pub payload_parse: u64,
    pub unresolved_device: u64,
}

impl SkipCounts {
    pub fn total(&self) -> u64 {
        self.malformed_envelope + self.payload_parse + self.unresolved_device
    }

    /// Records lost before persistence (mapping + parsing)
    pub fn before_persist(&self) -> u64 {
        self.malformed_envelope + self.payload_parse
    }
}

/// Outcome of one delivered byte stream
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Correlation id supplied by the delivery collaborator
    pub batch_id: String,

    /// Container entries decoded
    pub decoded: u64,

    /// Readings produced by the parser
    pub parsed: u64,

    /// Rows durably committed
    pub persisted: u64,

    pub skipped: SkipCounts,

    /// Container-level failure; nothing was persisted
    pub container_error: Option<DecodeError>,

    /// Persistence-level failure; the transaction was rolled back
    pub batch_error: Option<BatchError>,

    /// Wall time spent on the batch
    pub duration: Duration,
}

impl BatchOutcome {
    pub fn new(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            ..Default::default()
        }
    }

    pub fn failed(&self) -> bool {
        self.container_error.is_some() || self.batch_error.is_some()
    }

    pub fn skipped_total(&self) -> u64 {
        self.skipped.total()
    }

    /// Class of the batch-level error, if any
    pub fn error_class(&self) -> Option<ErrorClass> {
        if self.container_error.is_some() {
            Some(ErrorClass::Decode)
        } else {
            self.batch_error.as_ref().map(BatchError::class)
        }
    }

    /// Human-readable batch-level error, if any
    pub fn error_message(&self) -> Option<String> {
        self.container_error
            .as_ref()
            .map(ToString::to_string)
            .or_else(|| self.batch_error.as_ref().map(ToString::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_totals() {
        let skipped = SkipCounts {
            malformed_envelope: 1,
            payload_parse: 2,
            unresolved_device: 3,
        };
        assert_eq!(skipped.total(), 6);
        assert_eq!(skipped.before_persist(), 3);
    }

    #[test]
    fn test_outcome_error_class() {
        let mut outcome = BatchOutcome::new("b1");
        assert!(!outcome.failed());
        assert_eq!(outcome.error_class(), None);

        outcome.batch_error = Some(StorageError::connection("gone").into());
        assert!(outcome.failed());
        assert_eq!(outcome.error_class(), Some(ErrorClass::Storage));

        outcome.container_error = Some(DecodeError::header("bad magic"));
        assert_eq!(outcome.error_class(), Some(ErrorClass::Decode));
        assert!(outcome.error_message().unwrap().contains("bad magic"));
    }

    #[test]
    fn test_rolled_back_summary_has_no_rows() {
        let summary = PersistSummary::rolled_back(2, StorageError::query("boom").into());
        assert_eq!(summary.inserted, 0);
        assert!(summary.failed);
        assert_eq!(summary.skipped, 2);
    }
}
