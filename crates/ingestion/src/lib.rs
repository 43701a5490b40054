//! # Ingestion
//!
//! Turns a delivered capture container into typed envelopes.
//!
//! Responsibilities:
//! - Validate the container header and decode data blocks lazily
//! - Map each untyped entry to a `RawEnvelope`, or a typed error
//! - Write capture containers (fixtures, sample files)
//!
//! ## Usage Example
//!
//! ```no_run
//! use ingestion::EnvelopeStream;
//!
//! let file = std::fs::File::open("capture.avro").unwrap();
//! for item in EnvelopeStream::open(std::io::BufReader::new(file)).unwrap() {
//!     match item {
//!         Ok(envelope) => println!("{}: {}", envelope.sequence_number, envelope.body_text()),
//!         Err(e) if e.is_fatal() => break,
//!         Err(e) => eprintln!("skipped: {e}"),
//!     }
//! }
//! ```

mod capture;
mod container;
mod error;
mod mapper;
mod stream;

// Re-exports
pub use capture::{format_capture_time, CaptureEvent, CaptureWriter, CAPTURE_SCHEMA};
pub use container::{ContainerDecoder, ContainerEntry};
pub use contracts::RawEnvelope;
pub use error::{DecodeError, EntryError, IngestionError, MalformedEnvelopeError, Result};
pub use mapper::{parse_enqueued_time, EnvelopeMapper};
pub use stream::{inspect, EnvelopeStream};
