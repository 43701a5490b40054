//! # Contracts
//!
//! Frozen interface contracts shared by every pipeline crate.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - `SensorReading::captured_at` (device/gateway clock) is authoritative
//! - `RawEnvelope::enqueued_time` is best effort and defaults to the Unix epoch

mod config;
mod device_address;
mod envelope;
mod error;
mod outcome;
mod reading;
mod row;
mod store;

pub use config::*;
pub use device_address::DeviceAddress;
pub use envelope::*;
pub use error::*;
pub use outcome::*;
pub use reading::*;
pub use row::*;
pub use store::{LocalTelemetryStore, LocalTelemetryTransaction, TelemetryStore, TelemetryTransaction};
