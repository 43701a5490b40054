//! # Telemetry Parser
//!
//! Decodes an envelope body (UTF-8 JSON) into a `SensorReading`.
//!
//! Only `device.address` is required. Measurements that are absent or not
//! numeric default to zero, and an unusable capture time defaults to the
//! Unix epoch.
//!
//! ## Usage Example
//!
//! ```
//! let body = br#"{"device": {"address": "c8:25:2d:8e:9c:2c"}, "sensors": {"temperature": 21.5}}"#;
//! let reading = telemetry_parser::parse_reading(body).unwrap();
//! assert_eq!(reading.device_address.as_str(), "C8:25:2D:8E:9C:2C");
//! assert_eq!(reading.temperature_c, 21.5);
//! ```

mod capture_time;
mod document;

pub use capture_time::CaptureTime;
pub use contracts::{PayloadParseError, SensorReading};

use chrono::{DateTime, Utc};
use contracts::{DeviceAddress, RawEnvelope};
use tracing::debug;

use document::{to_f64, to_i32, to_millivolts, DeviceSection, Scalar, TelemetryDocument};

/// Parse one telemetry body
///
/// # Errors
/// - `InvalidUtf8` / `InvalidDocument` when the body is not a JSON object
/// - `MissingDeviceAddress` / `InvalidDeviceAddress` for a bad `device.address`
pub fn parse_reading(body: &[u8]) -> Result<SensorReading, PayloadParseError> {
    let text = std::str::from_utf8(body).map_err(|e| PayloadParseError::InvalidUtf8 {
        message: e.to_string(),
    })?;
    let document: TelemetryDocument =
        serde_json::from_str(text).map_err(|e| PayloadParseError::InvalidDocument {
            message: e.to_string(),
        })?;

    let device_address = device_address(&document.device)?;
    let captured_at = match document.timestamp.as_ref().map(CaptureTime::resolve) {
        Some(Some(time)) => time,
        other => {
            debug!(
                device_address = %device_address,
                present = other.is_some(),
                "capture time unusable, defaulting to epoch"
            );
            DateTime::<Utc>::UNIX_EPOCH
        }
    };

    let sensors = &document.sensors;
    Ok(SensorReading {
        device_type: device_type(&document.device),
        captured_at,
        signal_strength: to_i32(document.rssi),
        temperature_c: to_f64(sensors.temperature),
        humidity_pct: to_f64(sensors.humidity),
        pressure_pa: to_i32(sensors.pressure),
        acceleration_x: to_f64(sensors.acceleration_x),
        acceleration_y: to_f64(sensors.acceleration_y),
        acceleration_z: to_f64(sensors.acceleration_z),
        battery_mv: to_millivolts(sensors.voltage),
        tx_power_dbm: to_i32(sensors.tx_power),
        movement_count: to_i32(sensors.movement_count),
        device_sequence: to_i32(sensors.sequence),
        device_address,
    })
}

/// Parse the body of a mapped envelope
pub fn parse_envelope(envelope: &RawEnvelope) -> Result<SensorReading, PayloadParseError> {
    parse_reading(&envelope.body)
}

fn device_address(device: &DeviceSection) -> Result<DeviceAddress, PayloadParseError> {
    match device.address.as_deref().map(Scalar::of) {
        None | Some(Scalar::Null) => Err(PayloadParseError::MissingDeviceAddress),
        Some(Scalar::Text(address)) => DeviceAddress::parse(&address),
        Some(Scalar::Number(other) | Scalar::Other(other)) => {
            Err(PayloadParseError::InvalidDeviceAddress {
                address: other.to_string(),
            })
        }
    }
}

fn device_type(device: &DeviceSection) -> String {
    match device.kind.as_deref().map(Scalar::of) {
        Some(Scalar::Text(kind)) => kind,
        Some(Scalar::Null) | None => String::new(),
        Some(Scalar::Number(other) | Scalar::Other(other)) => other.to_string(),
    }
}
