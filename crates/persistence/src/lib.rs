//! # Persistence
//!
//! Transactional batch writes of telemetry rows.
//!
//! Responsibilities:
//! - Resolve each reading's device and insert one row per resolved reading
//! - Commit the batch as a whole, or roll all of it back
//! - Provide the PostgreSQL store and an in-memory store
//!
//! ## Usage Example
//!
//! ```ignore
//! use persistence::{BatchPersister, PostgresTelemetryStore};
//!
//! let store = PostgresTelemetryStore::new(&config.database, &config.schema)?;
//! let persister = BatchPersister::new(config.pipeline.unresolved_device);
//! let summary = persister.persist(&store, "capture-00.avro", &readings).await;
//! assert!(!summary.failed);
//! ```

mod error;
mod memory;
mod persister;
mod postgres;

// Re-exports
pub use contracts::{PersistSummary, TelemetryStore, TelemetryTransaction};
pub use error::{PersistenceError, StorageError};
pub use memory::{InMemoryTelemetryStore, InMemoryTransaction, MemoryStoreStats};
pub use persister::BatchPersister;
pub use postgres::{create_pool, PostgresTelemetryStore, PostgresTransaction, TelemetrySql};
