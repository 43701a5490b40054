//! SensorReading - Telemetry Parser output

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DeviceAddress;

/// One decoded telemetry sample
///
/// `device_address` is validated at construction; a reading without a valid
/// address cannot exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Hardware identity, join key to the device table
    pub device_address: DeviceAddress,

    /// Advertising/discovery mode label (informational)
    pub device_type: String,

    /// Sample time reported by the device/gateway
    pub captured_at: DateTime<Utc>,

    /// RSSI (dBm)
    pub signal_strength: i32,

    /// Temperature (°C)
    pub temperature_c: f64,

    /// Relative humidity (%)
    pub humidity_pct: f64,

    /// Pressure (Pa)
    pub pressure_pa: i32,

    /// Acceleration (g)
    pub acceleration_x: f64,
    pub acceleration_y: f64,
    pub acceleration_z: f64,

    /// Battery voltage (mV)
    pub battery_mv: i32,

    /// Transmit power (dBm)
    pub tx_power_dbm: i32,

    /// Movement counter
    pub movement_count: i32,

    /// Device-local rolling counter, observability only
    pub device_sequence: i32,
}

impl SensorReading {
    /// Reading with every measurement zeroed, for the given device
    pub fn empty(device_address: DeviceAddress) -> Self {
        Self {
            device_address,
            device_type: String::new(),
            captured_at: DateTime::<Utc>::UNIX_EPOCH,
            signal_strength: 0,
            temperature_c: 0.0,
            humidity_pct: 0.0,
            pressure_pa: 0,
            acceleration_x: 0.0,
            acceleration_y: 0.0,
            acceleration_z: 0.0,
            battery_mv: 0,
            tx_power_dbm: 0,
            movement_count: 0,
            device_sequence: 0,
        }
    }
}
