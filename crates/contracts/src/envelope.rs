//! RawEnvelope - Envelope Mapper output
//!
//! One container entry with its delivery metadata, strongly typed.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Value of a system/user property carried on an envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Long(i64),
    Double(f64),
    Text(String),
    Bytes(Bytes),
}

/// Property map as delivered by the origin stream
pub type Properties = HashMap<String, PropertyValue>;

/// One transport-level record: delivery metadata plus opaque body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEnvelope {
    /// Monotonic within a batch, not unique across batches
    pub sequence_number: i64,

    /// Opaque position marker from the origin stream (audit only)
    pub offset: String,

    /// Source-assigned enqueue time, Unix epoch when unparsable
    pub enqueued_time: DateTime<Utc>,

    /// Origin-stream metadata
    pub system_properties: Properties,

    /// User-stream metadata
    pub properties: Properties,

    /// Opaque payload (zero-copy)
    pub body: Bytes,
}

impl RawEnvelope {
    /// Whether the source supplied a usable enqueue time
    pub fn has_enqueued_time(&self) -> bool {
        self.enqueued_time != DateTime::<Utc>::UNIX_EPOCH
    }

    /// Lossy UTF-8 view of the body, for inspection and logging only
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
