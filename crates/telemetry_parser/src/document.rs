//! Telemetry document shape
//!
//! Every field is optional at this layer. Sections that are `null` or not
//! objects read as empty, and values that are not finite numbers (or numeric
//! strings) read as absent. Fields are captured as raw JSON text first, so an
//! out-of-range literal such as `1e400` never fails the document.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;

use crate::capture_time::CaptureTime;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TelemetryDocument {
    #[serde(default, deserialize_with = "lenient_section")]
    pub device: DeviceSection,

    #[serde(default, deserialize_with = "lenient_number")]
    pub rssi: Option<f64>,

    #[serde(
        default,
        alias = "time",
        alias = "capturedAt",
        deserialize_with = "capture_time"
    )]
    pub timestamp: Option<CaptureTime>,

    #[serde(default, deserialize_with = "lenient_section")]
    pub sensors: SensorSection,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeviceSection {
    /// Kept raw so a non-string address is reported, not a parse failure
    #[serde(default)]
    pub address: Option<Box<RawValue>>,

    #[serde(default, rename = "type")]
    pub kind: Option<Box<RawValue>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SensorSection {
    #[serde(default, deserialize_with = "lenient_number")]
    pub humidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub pressure: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub acceleration_x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub acceleration_y: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub acceleration_z: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub voltage: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub tx_power: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub movement_count: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub sequence: Option<f64>,
}

/// One JSON value, classified from its raw text
#[derive(Debug, PartialEq)]
pub(crate) enum Scalar<'a> {
    Null,
    Text(String),
    Number(&'a str),
    /// Bool, array or object, as written
    Other(&'a str),
}

impl<'a> Scalar<'a> {
    pub(crate) fn of(raw: &'a RawValue) -> Self {
        let text = raw.get();
        match text.as_bytes().first().copied() {
            Some(b'"') => match serde_json::from_str::<String>(text) {
                Ok(unescaped) => Self::Text(unescaped),
                Err(_) => Self::Other(text),
            },
            Some(b'-' | b'0'..=b'9') => Self::Number(text),
            _ if text == "null" => Self::Null,
            _ => Self::Other(text),
        }
    }

    /// Finite number, from a number or a numeric string
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(text) => text.parse::<f64>().ok(),
            Self::Text(text) => text.trim().parse::<f64>().ok(),
            Self::Null | Self::Other(_) => None,
        }
        .filter(|f| f.is_finite())
    }
}

/// Nested object; `null` or any other shape reads as empty
fn lenient_section<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Box::<RawValue>::deserialize(deserializer)?;
    Ok(serde_json::from_str(raw.get()).unwrap_or_default())
}

/// Number or numeric string; anything else is absent
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Box::<RawValue>::deserialize(deserializer)?;
    Ok(Scalar::of(&raw).as_f64())
}

fn capture_time<'de, D>(deserializer: D) -> Result<Option<CaptureTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Box::<RawValue>::deserialize(deserializer)?;
    let scalar = Scalar::of(&raw);
    Ok(match scalar {
        Scalar::Number(_) => scalar.as_f64().map(CaptureTime::Epoch),
        Scalar::Text(text) => Some(CaptureTime::Text(text)),
        Scalar::Null | Scalar::Other(_) => None,
    })
}

/// Round to `i32`, zero when absent or out of range
pub(crate) fn to_i32(value: Option<f64>) -> i32 {
    match value.map(f64::round) {
        Some(v) if v >= f64::from(i32::MIN) && v <= f64::from(i32::MAX) => v as i32,
        _ => 0,
    }
}

pub(crate) fn to_f64(value: Option<f64>) -> f64 {
    value.unwrap_or(0.0)
}

/// Battery voltage in millivolts; small values are taken as volts
pub(crate) fn to_millivolts(value: Option<f64>) -> i32 {
    match value {
        Some(v) if v < 100.0 => to_i32(Some(v * 1000.0)),
        other => to_i32(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_numbers() {
        let doc: TelemetryDocument = serde_json::from_str(
            r#"{"rssi": "-71", "sensors": {"humidity": "n/a", "pressure": 100512.4,
                "temperature": null, "txPower": [4], "sequence": " 12 "}}"#,
        )
        .unwrap();
        assert_eq!(doc.rssi, Some(-71.0));
        assert_eq!(doc.sensors.humidity, None);
        assert_eq!(doc.sensors.pressure, Some(100512.4));
        assert_eq!(doc.sensors.temperature, None);
        assert_eq!(doc.sensors.tx_power, None);
        assert_eq!(doc.sensors.sequence, Some(12.0));
    }

    #[test]
    fn test_capture_time_aliases() {
        for body in [
            r#"{"timestamp": 1}"#,
            r#"{"time": 1}"#,
            r#"{"capturedAt": 1}"#,
        ] {
            let doc: TelemetryDocument = serde_json::from_str(body).unwrap();
            assert_eq!(doc.timestamp, Some(CaptureTime::Epoch(1.0)), "body {body}");
        }
        let doc: TelemetryDocument = serde_json::from_str(r#"{"timestamp": {}}"#).unwrap();
        assert_eq!(doc.timestamp, None);
    }

    #[test]
    fn test_null_sections_read_as_empty() {
        let doc: TelemetryDocument =
            serde_json::from_str(r#"{"device": null, "sensors": null}"#).unwrap();
        assert!(doc.device.address.is_none());
        assert_eq!(doc.sensors.temperature, None);

        let doc: TelemetryDocument =
            serde_json::from_str(r#"{"device": {"address": "x"}, "sensors": [1, 2]}"#).unwrap();
        assert!(doc.device.address.is_some());
        assert_eq!(doc.sensors.humidity, None);
    }

    #[test]
    fn test_out_of_range_literals_are_absent() {
        let doc: TelemetryDocument = serde_json::from_str(
            r#"{"rssi": 1e400, "timestamp": -1e999, "sensors": {"pressure": 1e400, "humidity": 40}}"#,
        )
        .unwrap();
        assert_eq!(doc.rssi, None);
        assert_eq!(doc.timestamp, None);
        assert_eq!(doc.sensors.pressure, None);
        assert_eq!(doc.sensors.humidity, Some(40.0));
    }

    #[test]
    fn test_scalar_classification() {
        let raw = |text: &str| RawValue::from_string(text.to_string()).unwrap();
        assert_eq!(Scalar::of(&raw("null")), Scalar::Null);
        assert_eq!(Scalar::of(&raw(r#""a\"b""#)), Scalar::Text("a\"b".to_string()));
        assert_eq!(Scalar::of(&raw("-4.5e1")).as_f64(), Some(-45.0));
        assert_eq!(Scalar::of(&raw("true")), Scalar::Other("true"));
        assert_eq!(Scalar::of(&raw(r#"" inf ""#)).as_f64(), None);
    }

    #[test]
    fn test_integer_conversion() {
        assert_eq!(to_i32(Some(2.5)), 3);
        assert_eq!(to_i32(Some(-2.5)), -3);
        assert_eq!(to_i32(None), 0);
        assert_eq!(to_i32(Some(3e10)), 0);
    }

    #[test]
    fn test_voltage_units() {
        assert_eq!(to_millivolts(Some(2.995)), 2995);
        assert_eq!(to_millivolts(Some(2995.0)), 2995);
        assert_eq!(to_millivolts(None), 0);
    }
}
