//! Ingestion error types

use thiserror::Error;

pub use contracts::{DecodeError, MalformedEnvelopeError};

/// Failure for a single position in an envelope stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    /// Container-level, ends the stream
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Entry-level, the stream continues
    #[error("entry {index}: {source}")]
    Malformed {
        index: u64,
        #[source]
        source: MalformedEnvelopeError,
    },
}

impl EntryError {
    /// Whether the whole container must be abandoned
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// Errors raised while producing capture containers
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Capture schema could not be parsed
    #[error("invalid capture schema: {message}")]
    Schema {
        /// Error message
        message: String,
    },

    /// Container could not be encoded
    #[error("failed to write capture container: {message}")]
    CaptureWrite {
        /// Error message
        message: String,
    },
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
