//! Capture Writer
//!
//! Produces event-hub capture containers in-process. Used to build test
//! fixtures and sample files without checking binaries into the repository.

use std::collections::HashMap;

use apache_avro::types::Value;
use apache_avro::{Codec, Schema, Writer};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use contracts::PropertyValue;

use crate::error::{IngestionError, Result};
use crate::mapper::{
    FIELD_BODY, FIELD_ENQUEUED_TIME, FIELD_OFFSET, FIELD_PROPERTIES, FIELD_SEQUENCE_NUMBER,
    FIELD_SYSTEM_PROPERTIES,
};

/// Writer schema used by the event-hub capture feature
pub const CAPTURE_SCHEMA: &str = r#"{
    "type": "record",
    "name": "EventData",
    "namespace": "Microsoft.ServiceBus.Messaging",
    "fields": [
        {"name": "SequenceNumber", "type": "long"},
        {"name": "Offset", "type": "string"},
        {"name": "EnqueuedTimeUtc", "type": "string"},
        {"name": "SystemProperties", "type": {"type": "map", "values": ["long", "double", "string", "bytes"]}},
        {"name": "Properties", "type": {"type": "map", "values": ["long", "double", "string", "bytes", "null"]}},
        {"name": "Body", "type": ["null", "bytes"]}
    ]
}"#;

/// Format a timestamp the way capture files carry `EnqueuedTimeUtc`
pub fn format_capture_time(time: DateTime<Utc>) -> String {
    time.format("%-m/%-d/%Y %-I:%M:%S %p").to_string()
}

/// One event to be written into a capture container
#[derive(Debug, Clone)]
pub struct CaptureEvent {
    sequence_number: i64,
    offset: String,
    enqueued_time_utc: String,
    system_properties: HashMap<String, PropertyValue>,
    properties: HashMap<String, PropertyValue>,
    body: Option<Bytes>,
}

impl CaptureEvent {
    pub fn new(sequence_number: i64, body: impl Into<Bytes>) -> Self {
        Self {
            sequence_number,
            offset: (sequence_number * 512).to_string(),
            enqueued_time_utc: format_capture_time(DateTime::<Utc>::UNIX_EPOCH),
            system_properties: HashMap::new(),
            properties: HashMap::new(),
            body: Some(body.into()),
        }
    }

    pub fn with_offset(mut self, offset: impl Into<String>) -> Self {
        self.offset = offset.into();
        self
    }

    /// Raw `EnqueuedTimeUtc` text, written as-is (may be deliberately unparsable)
    pub fn with_enqueued_time_utc(mut self, text: impl Into<String>) -> Self {
        self.enqueued_time_utc = text.into();
        self
    }

    pub fn with_enqueued_time(self, time: DateTime<Utc>) -> Self {
        self.with_enqueued_time_utc(format_capture_time(time))
    }

    pub fn with_system_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.system_properties.insert(key.into(), value);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Write `Body` as `null`
    pub fn without_body(mut self) -> Self {
        self.body = None;
        self
    }

    fn into_value(self) -> Value {
        let system_properties = self
            .system_properties
            .into_iter()
            .filter_map(|(k, v)| system_property_value(v).map(|v| (k, v)))
            .collect();
        let properties = self
            .properties
            .into_iter()
            .map(|(k, v)| (k, property_value(v)))
            .collect();
        let body = match self.body {
            Some(bytes) => Value::Union(1, Box::new(Value::Bytes(bytes.to_vec()))),
            None => Value::Union(0, Box::new(Value::Null)),
        };

        Value::Record(vec![
            (FIELD_SEQUENCE_NUMBER.to_string(), Value::Long(self.sequence_number)),
            (FIELD_OFFSET.to_string(), Value::String(self.offset)),
            (FIELD_ENQUEUED_TIME.to_string(), Value::String(self.enqueued_time_utc)),
            (FIELD_SYSTEM_PROPERTIES.to_string(), Value::Map(system_properties)),
            (FIELD_PROPERTIES.to_string(), Value::Map(properties)),
            (FIELD_BODY.to_string(), body),
        ])
    }
}

/// `SystemProperties` union: long | double | string | bytes
fn system_property_value(value: PropertyValue) -> Option<Value> {
    let (index, inner) = match value {
        PropertyValue::Long(n) => (0, Value::Long(n)),
        PropertyValue::Double(f) => (1, Value::Double(f)),
        PropertyValue::Text(s) => (2, Value::String(s)),
        PropertyValue::Bool(b) => (2, Value::String(b.to_string())),
        PropertyValue::Bytes(b) => (3, Value::Bytes(b.to_vec())),
        PropertyValue::Null => return None,
    };
    Some(Value::Union(index, Box::new(inner)))
}

/// `Properties` union: long | double | string | bytes | null
fn property_value(value: PropertyValue) -> Value {
    match value {
        PropertyValue::Null => Value::Union(4, Box::new(Value::Null)),
        other => system_property_value(other).unwrap_or(Value::Union(4, Box::new(Value::Null))),
    }
}

/// Accumulates events and encodes them as one capture container
#[derive(Debug, Clone, Default)]
pub struct CaptureWriter {
    events: Vec<CaptureEvent>,
    deflate: bool,
}

impl CaptureWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compress data blocks with deflate
    pub fn with_deflate(mut self) -> Self {
        self.deflate = true;
        self
    }

    pub fn push(&mut self, event: CaptureEvent) -> &mut Self {
        self.events.push(event);
        self
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Encode all pushed events
    ///
    /// An empty writer still produces a valid container (header only).
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        let schema = Schema::parse_str(CAPTURE_SCHEMA).map_err(|e| IngestionError::Schema {
            message: e.to_string(),
        })?;
        let codec = if self.deflate {
            Codec::Deflate
        } else {
            Codec::Null
        };

        let mut writer = Writer::with_codec(&schema, Vec::new(), codec);
        for event in self.events {
            writer.append(event.into_value()).map_err(write_error)?;
        }
        writer.flush().map_err(write_error)?;
        writer.into_inner().map_err(write_error)
    }
}

fn write_error(e: apache_avro::Error) -> IngestionError {
    IngestionError::CaptureWrite {
        message: e.to_string(),
    }
}
