//! Batch Persister - one transaction per batch
//!
//! Resolve, insert, then commit. Any storage error rolls the whole batch back.

use std::collections::HashMap;

use contracts::{
    BatchError, DeviceAddress, DeviceId, DeviceResolutionError, PersistSummary, PersistedRow,
    SensorReading, StorageError, TelemetryStore, TelemetryTransaction, UnresolvedDevicePolicy,
};
use tracing::{debug, error, info, instrument, warn};

/// Writes a batch of readings atomically
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchPersister {
    policy: UnresolvedDevicePolicy,
}

/// Counts of a fully written (not yet committed) batch
#[derive(Debug, Default)]
struct WriteCounts {
    inserted: u64,
    skipped: u64,
}

impl BatchPersister {
    pub fn new(policy: UnresolvedDevicePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> UnresolvedDevicePolicy {
        self.policy
    }

    /// Persist `readings` inside one transaction
    ///
    /// Durable rows exist iff the returned summary is not `failed`. An empty
    /// batch does not touch storage.
    #[instrument(
        name = "batch_persister_persist",
        skip(self, store, readings),
        fields(batch_id = %batch_id, readings = readings.len(), store = store.name())
    )]
    pub async fn persist<S>(&self, store: &S, batch_id: &str, readings: &[SensorReading]) -> PersistSummary
    where
        S: TelemetryStore + Sync,
        S::Transaction: Send,
    {
        if readings.is_empty() {
            debug!("no readings, skipping transaction");
            return PersistSummary::default();
        }

        let mut tx = match store.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                error!(error = %e, kind = e.kind(), "failed to begin transaction");
                return PersistSummary::rolled_back(0, e.into());
            }
        };

        let counts = match self.write_all(&mut tx, readings).await {
            Ok(counts) => counts,
            Err((skipped, e)) => {
                error!(error = %e, class = e.class().as_str(), "batch failed, rolling back");
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "rollback failed, connection discarded");
                }
                return PersistSummary::rolled_back(skipped, e);
            }
        };

        if let Err(e) = tx.commit().await {
            error!(error = %e, kind = e.kind(), "commit failed");
            return PersistSummary::rolled_back(counts.skipped, e.into());
        }

        info!(
            inserted = counts.inserted,
            skipped = counts.skipped,
            "batch committed"
        );
        PersistSummary {
            inserted: counts.inserted,
            skipped: counts.skipped,
            failed: false,
            error: None,
        }
    }

    /// Returns the skip count so far alongside the error on failure
    async fn write_all<T>(
        &self,
        tx: &mut T,
        readings: &[SensorReading],
    ) -> Result<WriteCounts, (u64, BatchError)>
    where
        T: TelemetryTransaction + Send,
    {
        let mut resolved: HashMap<DeviceAddress, Option<DeviceId>> = HashMap::new();
        let mut counts = WriteCounts::default();

        for reading in readings {
            let device_id = match resolved.get(&reading.device_address) {
                Some(cached) => *cached,
                None => {
                    let lookup = tx
                        .resolve_device(&reading.device_address)
                        .await
                        .map_err(|e| storage_failure(counts.skipped, e))?;
                    resolved.insert(reading.device_address.clone(), lookup);
                    lookup
                }
            };

            let Some(device_id) = device_id else {
                let unresolved = DeviceResolutionError {
                    address: reading.device_address.to_string(),
                };
                match self.policy {
                    UnresolvedDevicePolicy::Skip => {
                        warn!(device_address = %reading.device_address, "device not registered, skipping reading");
                        counts.skipped += 1;
                        continue;
                    }
                    UnresolvedDevicePolicy::FailBatch => {
                        return Err((counts.skipped, unresolved.into()));
                    }
                }
            };

            tx.insert_row(&PersistedRow::from_reading(device_id, reading))
                .await
                .map_err(|e| storage_failure(counts.skipped, e))?;
            counts.inserted += 1;
        }

        Ok(counts)
    }
}

fn storage_failure(skipped: u64, error: StorageError) -> (u64, BatchError) {
    (skipped, BatchError::Storage(error))
}
