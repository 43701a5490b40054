//! Envelope Mapper
//!
//! Converts one untyped container entry into a `RawEnvelope`.
//! Required: `SequenceNumber`, `Body`. Everything else is coerced leniently.

use std::collections::HashMap;

use apache_avro::types::Value;
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use contracts::{MalformedEnvelopeError, Properties, PropertyValue, RawEnvelope};
use tracing::debug;

use crate::container::ContainerEntry;

pub(crate) const FIELD_SEQUENCE_NUMBER: &str = "SequenceNumber";
pub(crate) const FIELD_OFFSET: &str = "Offset";
pub(crate) const FIELD_ENQUEUED_TIME: &str = "EnqueuedTimeUtc";
pub(crate) const FIELD_SYSTEM_PROPERTIES: &str = "SystemProperties";
pub(crate) const FIELD_PROPERTIES: &str = "Properties";
pub(crate) const FIELD_BODY: &str = "Body";

/// Text formats accepted for `EnqueuedTimeUtc` besides RFC 3339
const ENQUEUED_TIME_FORMATS: [&str; 4] = [
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Maps container entries to typed envelopes
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeMapper;

impl EnvelopeMapper {
    pub fn new() -> Self {
        Self
    }

    /// Map one container entry, consuming it so the body is moved, not copied
    ///
    /// # Errors
    /// `MalformedEnvelopeError` when the entry is not a record, or
    /// `SequenceNumber`/`Body` is missing or mistyped
    pub fn map(&self, entry: ContainerEntry) -> Result<RawEnvelope, MalformedEnvelopeError> {
        let mut fields = match unwrap_union(entry.value) {
            Value::Record(fields) => fields.into_iter().collect::<HashMap<String, Value>>(),
            other => {
                return Err(MalformedEnvelopeError::NotARecord {
                    found: type_name(&other),
                })
            }
        };

        let sequence_number = map_sequence_number(fields.remove(FIELD_SEQUENCE_NUMBER))?;
        let body = map_body(fields.remove(FIELD_BODY))?;

        let offset = map_offset(fields.remove(FIELD_OFFSET));
        let enqueued_time = map_enqueued_time(fields.remove(FIELD_ENQUEUED_TIME));
        if enqueued_time == DateTime::<Utc>::UNIX_EPOCH {
            debug!(
                entry_index = entry.index,
                sequence_number, "enqueued time unparsable, defaulting to epoch"
            );
        }

        Ok(RawEnvelope {
            sequence_number,
            offset,
            enqueued_time,
            system_properties: map_properties(fields.remove(FIELD_SYSTEM_PROPERTIES)),
            properties: map_properties(fields.remove(FIELD_PROPERTIES)),
            body,
        })
    }
}

fn unwrap_union(value: Value) -> Value {
    match value {
        Value::Union(_, inner) => unwrap_union(*inner),
        other => other,
    }
}

fn type_name(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Boolean(_) => "boolean",
        Value::Int(_) => "int",
        Value::Long(_) => "long",
        Value::Float(_) => "float",
        Value::Double(_) => "double",
        Value::Bytes(_) => "bytes",
        Value::String(_) => "string",
        Value::Fixed(..) => "fixed",
        Value::Enum(..) => "enum",
        Value::Union(..) => "union",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Record(_) => "record",
        _ => "logical",
    }
    .to_string()
}

fn map_sequence_number(value: Option<Value>) -> Result<i64, MalformedEnvelopeError> {
    let missing = MalformedEnvelopeError::MissingField {
        field: FIELD_SEQUENCE_NUMBER,
    };
    match value.map(unwrap_union) {
        None | Some(Value::Null) => Err(missing),
        Some(Value::Long(n)) => Ok(n),
        Some(Value::Int(n)) => Ok(i64::from(n)),
        Some(other) => Err(MalformedEnvelopeError::WrongType {
            field: FIELD_SEQUENCE_NUMBER,
            expected: "long",
            found: type_name(&other),
        }),
    }
}

fn map_body(value: Option<Value>) -> Result<Bytes, MalformedEnvelopeError> {
    match value.map(unwrap_union) {
        None | Some(Value::Null) => Err(MalformedEnvelopeError::MissingField { field: FIELD_BODY }),
        Some(Value::Bytes(bytes)) | Some(Value::Fixed(_, bytes)) => Ok(Bytes::from(bytes)),
        Some(Value::String(text)) => Ok(Bytes::from(text)),
        Some(other) => Err(MalformedEnvelopeError::WrongType {
            field: FIELD_BODY,
            expected: "bytes",
            found: type_name(&other),
        }),
    }
}

fn map_offset(value: Option<Value>) -> String {
    match value.map(unwrap_union) {
        Some(Value::String(offset)) => offset,
        Some(Value::Long(n)) => n.to_string(),
        Some(Value::Int(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn map_enqueued_time(value: Option<Value>) -> DateTime<Utc> {
    let parsed = match value.map(unwrap_union) {
        Some(Value::String(text)) => parse_enqueued_time(&text),
        Some(Value::Long(millis)) | Some(Value::TimestampMillis(millis)) => {
            DateTime::from_timestamp_millis(millis)
        }
        Some(Value::TimestampMicros(micros)) => DateTime::from_timestamp_micros(micros),
        _ => None,
    };
    parsed.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Parse an enqueue time as written by capture producers
pub fn parse_enqueued_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    ENQUEUED_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

fn map_properties(value: Option<Value>) -> Properties {
    match value.map(unwrap_union) {
        Some(Value::Map(map)) => map
            .into_iter()
            .filter_map(|(key, value)| to_property_value(value).map(|v| (key, v)))
            .collect(),
        _ => Properties::new(),
    }
}

fn to_property_value(value: Value) -> Option<PropertyValue> {
    match unwrap_union(value) {
        Value::Null => Some(PropertyValue::Null),
        Value::Boolean(b) => Some(PropertyValue::Bool(b)),
        Value::Int(n) => Some(PropertyValue::Long(i64::from(n))),
        Value::Long(n) => Some(PropertyValue::Long(n)),
        Value::Float(f) => Some(PropertyValue::Double(f64::from(f))),
        Value::Double(f) => Some(PropertyValue::Double(f)),
        Value::String(s) | Value::Enum(_, s) => Some(PropertyValue::Text(s)),
        Value::Bytes(b) | Value::Fixed(_, b) => Some(PropertyValue::Bytes(Bytes::from(b))),
        _ => None,
    }
}
