//! PersistedRow - storage-facing row

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SensorReading;

/// Internal id of a device row (foreign key of telemetry rows)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub i64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Composite `parameters` column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryParameters {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: i32,
    pub battery_mv: i32,
    pub tx_power: i32,
}

/// One row of the telemetry table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRow {
    /// Resolved from the reading's address, never copied
    pub device_id: DeviceId,

    /// Ordering key for downstream consumers
    pub captured_at: DateTime<Utc>,

    pub parameters: TelemetryParameters,
}

impl PersistedRow {
    /// Build the row for a reading whose device resolved to `device_id`
    pub fn from_reading(device_id: DeviceId, reading: &SensorReading) -> Self {
        Self {
            device_id,
            captured_at: reading.captured_at,
            parameters: TelemetryParameters {
                temperature: reading.temperature_c,
                humidity: reading.humidity_pct,
                pressure: reading.pressure_pa,
                battery_mv: reading.battery_mv,
                tx_power: reading.tx_power_dbm,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeviceAddress;

    #[test]
    fn test_row_from_reading() {
        let mut reading = SensorReading::empty(DeviceAddress::parse("AA:BB:CC:DD:EE:FF").unwrap());
        reading.temperature_c = 21.5;
        reading.humidity_pct = 40.25;
        reading.pressure_pa = 100_512;
        reading.battery_mv = 2995;
        reading.tx_power_dbm = 4;
        reading.captured_at = DateTime::from_timestamp(1_760_000_000, 123_000_000).unwrap();

        let row = PersistedRow::from_reading(DeviceId(42), &reading);
        assert_eq!(row.device_id, DeviceId(42));
        assert_eq!(row.captured_at, reading.captured_at);
        assert_eq!(row.parameters.temperature, 21.5);
        assert_eq!(row.parameters.humidity, 40.25);
        assert_eq!(row.parameters.pressure, 100_512);
        assert_eq!(row.parameters.battery_mv, 2995);
        assert_eq!(row.parameters.tx_power, 4);
    }
}
