//! Layered error definitions
//!
//! Categorized by source: container / envelope / payload / device / storage / config.
//! Container and storage errors are batch-fatal, the rest only cost one record.

use serde::Serialize;
use thiserror::Error;

/// Container-level decode failure. Fatal to the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Header block could not be read (magic, schema, codec, sync marker)
    #[error("container header invalid: {message}")]
    Header { message: String },

    /// A data block was truncated or corrupt
    #[error("container block corrupt at entry {entry_index}: {message}")]
    Block { entry_index: u64, message: String },
}

impl DecodeError {
    pub fn header(message: impl Into<String>) -> Self {
        Self::Header {
            message: message.into(),
        }
    }

    pub fn block(entry_index: u64, message: impl Into<String>) -> Self {
        Self::Block {
            entry_index,
            message: message.into(),
        }
    }
}

/// Envelope missing required delivery metadata. Record-level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEnvelopeError {
    /// Entry was not a record at all
    #[error("container entry is not a record (found {found})")]
    NotARecord { found: String },

    /// Required field absent
    #[error("envelope field '{field}' is missing")]
    MissingField { field: &'static str },

    /// Field present with the wrong shape
    #[error("envelope field '{field}' has type {found}, expected {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
        found: String,
    },
}

/// Body could not be turned into a `SensorReading`. Record-level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadParseError {
    #[error("payload is not valid UTF-8: {message}")]
    InvalidUtf8 { message: String },

    #[error("payload is not a valid telemetry document: {message}")]
    InvalidDocument { message: String },

    #[error("payload has no device.address")]
    MissingDeviceAddress,

    #[error("device.address '{address}' is not a hardware address")]
    InvalidDeviceAddress { address: String },
}

/// Hardware address not present in the device table. Record-level by default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("device '{address}' not found")]
pub struct DeviceResolutionError {
    pub address: String,
}

/// Unrecoverable storage failure inside the batch transaction. Fatal to the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Connection lost or refused
    #[error("storage connection error: {message}")]
    Connection { message: String },

    /// Integrity constraint violated
    #[error("storage constraint violation ({code}): {message}")]
    Constraint { code: String, message: String },

    /// Serialization failure or deadlock
    #[error("storage serialization failure ({code}): {message}")]
    Serialization { code: String, message: String },

    /// Pool could not hand out a connection
    #[error("storage pool error: {message}")]
    Pool { message: String },

    /// Any other statement failure
    #[error("storage query error: {message}")]
    Query { message: String },
}

impl StorageError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    pub fn pool(message: impl Into<String>) -> Self {
        Self::Pool {
            message: message.into(),
        }
    }

    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::Constraint { .. } => "constraint",
            Self::Serialization { .. } => "serialization",
            Self::Pool { .. } => "pool",
            Self::Query { .. } => "query",
        }
    }
}

/// Error class reported in outcomes and metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Decode,
    MalformedEnvelope,
    PayloadParse,
    DeviceResolution,
    Storage,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::MalformedEnvelope => "malformed_envelope",
            Self::PayloadParse => "payload_parse",
            Self::DeviceResolution => "device_resolution",
            Self::Storage => "storage",
        }
    }

    /// Whether an error of this class aborts the whole batch
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::Decode | Self::Storage)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ContractError {
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}
