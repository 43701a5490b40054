//! TelemetryStore / TelemetryTransaction - Persister output interface
//!
//! A store hands out transactions; each transaction is owned by exactly one
//! batch for its whole lifetime. Implementations must discard all writes of
//! a transaction that is dropped without `commit`, so a cancelled batch
//! never leaves rows behind.

use crate::{DeviceAddress, DeviceId, PersistedRow, StorageError};

/// Durable storage for telemetry rows
#[trait_variant::make(TelemetryStore: Send)]
pub trait LocalTelemetryStore {
    /// Transaction type handed out by `begin`
    type Transaction: TelemetryTransaction;

    /// Store name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Start a transaction on a connection reserved for the caller
    ///
    /// # Errors
    /// Returns `StorageError` when no connection can be obtained
    async fn begin(&self) -> Result<Self::Transaction, StorageError>;
}

/// One open transaction
#[trait_variant::make(TelemetryTransaction: Send)]
pub trait LocalTelemetryTransaction {
    /// Look up the internal id of a device; `Ok(None)` when not registered
    async fn resolve_device(
        &mut self,
        address: &DeviceAddress,
    ) -> Result<Option<DeviceId>, StorageError>;

    /// Stage one row inside the transaction
    async fn insert_row(&mut self, row: &PersistedRow) -> Result<(), StorageError>;

    /// Make every staged row visible atomically
    async fn commit(self) -> Result<(), StorageError>;

    /// Discard every staged row
    async fn rollback(self) -> Result<(), StorageError>;
}
