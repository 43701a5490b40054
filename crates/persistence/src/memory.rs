//! In-memory store
//!
//! Same transactional contract as the PostgreSQL store: rows are staged per
//! transaction and only become visible on commit. Supports fault injection
//! for exercising rollback paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{
    DeviceAddress, DeviceId, PersistedRow, StorageError, TelemetryStore, TelemetryTransaction,
};
use tracing::debug;

#[derive(Debug, Default)]
struct MemoryState {
    devices: HashMap<DeviceAddress, DeviceId>,
    rows: Vec<PersistedRow>,
    lookups: u64,
    commits: u64,
    rollbacks: u64,
    abandoned: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Faults {
    /// 1-based insert (within a transaction) that fails as a connection loss
    fail_insert_at: Option<u64>,
    fail_commit: bool,
    fail_begin: bool,
}

/// Transaction counters, for assertions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub lookups: u64,
    pub commits: u64,
    pub rollbacks: u64,
    /// Transactions dropped without commit or rollback
    pub abandoned: u64,
}

/// Telemetry store held in process memory
///
/// Cloning shares the underlying tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTelemetryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Faults,
}

impl InMemoryTelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device; the address is normalized like incoming readings
    pub fn register_device(&self, address: &DeviceAddress, id: DeviceId) {
        lock(&self.state).devices.insert(address.clone(), id);
    }

    /// Fail the `n`-th insert of every transaction with a connection error
    pub fn fail_insert_at(mut self, n: u64) -> Self {
        self.faults.fail_insert_at = Some(n);
        self
    }

    /// Fail every commit with a serialization error
    pub fn fail_commit(mut self) -> Self {
        self.faults.fail_commit = true;
        self
    }

    /// Refuse to open transactions
    pub fn fail_begin(mut self) -> Self {
        self.faults.fail_begin = true;
        self
    }

    /// Committed rows, in commit order
    pub fn rows(&self) -> Vec<PersistedRow> {
        lock(&self.state).rows.clone()
    }

    pub fn row_count(&self) -> usize {
        lock(&self.state).rows.len()
    }

    pub fn stats(&self) -> MemoryStoreStats {
        let state = lock(&self.state);
        MemoryStoreStats {
            lookups: state.lookups,
            commits: state.commits,
            rollbacks: state.rollbacks,
            abandoned: state.abandoned,
        }
    }
}

impl TelemetryStore for InMemoryTelemetryStore {
    type Transaction = InMemoryTransaction;

    fn name(&self) -> &str {
        "memory"
    }

    async fn begin(&self) -> Result<InMemoryTransaction, StorageError> {
        if self.faults.fail_begin {
            return Err(StorageError::pool("injected: no connection available"));
        }
        Ok(InMemoryTransaction {
            state: Arc::clone(&self.state),
            faults: self.faults,
            staged: Vec::new(),
            inserts: 0,
            broken: false,
            finished: false,
        })
    }
}

/// Transaction staging rows until commit
#[derive(Debug)]
pub struct InMemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    faults: Faults,
    staged: Vec<PersistedRow>,
    inserts: u64,
    broken: bool,
    finished: bool,
}

impl InMemoryTransaction {
    fn ensure_usable(&self) -> Result<(), StorageError> {
        if self.broken {
            Err(StorageError::connection("connection lost"))
        } else {
            Ok(())
        }
    }
}

impl TelemetryTransaction for InMemoryTransaction {
    async fn resolve_device(
        &mut self,
        address: &DeviceAddress,
    ) -> Result<Option<DeviceId>, StorageError> {
        self.ensure_usable()?;
        let mut state = lock(&self.state);
        state.lookups += 1;
        Ok(state.devices.get(address).copied())
    }

    async fn insert_row(&mut self, row: &PersistedRow) -> Result<(), StorageError> {
        self.ensure_usable()?;
        self.inserts += 1;
        if self.faults.fail_insert_at == Some(self.inserts) {
            self.broken = true;
            return Err(StorageError::connection("injected: connection dropped"));
        }
        self.staged.push(row.clone());
        Ok(())
    }

    async fn commit(mut self) -> Result<(), StorageError> {
        self.finished = true;
        self.ensure_usable()?;
        if self.faults.fail_commit {
            return Err(StorageError::Serialization {
                code: "40001".to_string(),
                message: "injected: could not serialize access".to_string(),
            });
        }

        let staged = std::mem::take(&mut self.staged);
        let mut state = lock(&self.state);
        state.rows.extend(staged);
        state.commits += 1;
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), StorageError> {
        self.finished = true;
        self.staged.clear();
        lock(&self.state).rollbacks += 1;
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            debug!(staged = self.staged.len(), "discarding abandoned transaction");
            lock(&self.state).abandoned += 1;
        }
    }
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
