//! # Pipeline
//!
//! Orchestrates one delivered batch end to end: decode the container, map
//! envelopes, parse telemetry, then hand the readings to the persister in a
//! single transaction. [`run_batches`] fans many deliveries out over a bounded
//! worker pool.
//!
//! ## Usage Example
//!
//! ```ignore
//! use pipeline::{run_batches, BatchPipeline, DeliveredBatch};
//!
//! let pipeline = BatchPipeline::from_settings(&config.pipeline);
//! let outcome = pipeline.process("capture-0001", reader, &store).await;
//!
//! let stats = run_batches(pipeline, store, vec![DeliveredBatch::from_file(path)], 4).await;
//! stats.print_summary();
//! ```

mod batch;
mod runner;
mod stats;

pub use batch::{BatchPipeline, DecodedBatch};
pub use runner::{process_delivered, run_batches, BatchSource, DeliveredBatch};
pub use stats::RunStats;

pub use ingestion::inspect;
