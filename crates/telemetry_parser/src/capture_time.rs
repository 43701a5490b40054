//! Capture time
//!
//! Gateways report the sample time either as an epoch number or as text.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

/// Epoch magnitudes at or above this are milliseconds
const MILLIS_THRESHOLD: f64 = 1e11;

/// Storage keeps microseconds (`timestamptz`)
const SUBSEC_DIGITS: u16 = 6;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Sample time as found in the document, before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureTime {
    /// Seconds or milliseconds since the Unix epoch
    Epoch(f64),
    /// Formatted timestamp
    Text(String),
}

impl CaptureTime {
    /// Normalize to UTC at microsecond precision, `None` if the value is unusable
    pub fn resolve(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Epoch(value) => from_epoch(*value),
            Self::Text(text) => from_text(text),
        }
        .map(|time| time.trunc_subsecs(SUBSEC_DIGITS))
    }
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let millis = if value.abs() >= MILLIS_THRESHOLD {
        value.round()
    } else {
        (value * 1000.0).round()
    };
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

fn from_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
    {
        return Some(naive.and_utc());
    }
    text.parse::<f64>().ok().and_then(from_epoch)
}
