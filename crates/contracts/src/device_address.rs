//! DeviceAddress - validated hardware address
//!
//! Uses Arc<str> internally so clones are O(1); addresses are cloned into
//! per-batch resolution caches and log fields.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use crate::PayloadParseError;

/// Hardware (MAC-style) address of a beacon.
///
/// Always stored in canonical form: six upper-case hex octets joined by `:`.
/// Accepts `aa:bb:cc:dd:ee:ff`, `AA-BB-CC-DD-EE-FF` and `aabbccddeeff` on input.
///
/// # Examples
/// ```
/// use contracts::DeviceAddress;
///
/// let addr: DeviceAddress = "c8-25-2d-8e-9c-2c".parse().unwrap();
/// assert_eq!(addr.as_str(), "C8:25:2D:8E:9C:2C");
/// ```
#[derive(Clone)]
pub struct DeviceAddress(Arc<str>);

impl DeviceAddress {
    /// Parse and normalize a hardware address.
    pub fn parse(input: &str) -> Result<Self, PayloadParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PayloadParseError::MissingDeviceAddress);
        }

        let invalid = || PayloadParseError::InvalidDeviceAddress {
            address: trimmed.to_string(),
        };

        let octets: Vec<&str> = if trimmed.contains(':') {
            trimmed.split(':').collect()
        } else if trimmed.contains('-') {
            trimmed.split('-').collect()
        } else if trimmed.len() == 12 && trimmed.is_ascii() {
            (0..6).map(|i| &trimmed[i * 2..i * 2 + 2]).collect()
        } else {
            return Err(invalid());
        };

        if octets.len() != 6
            || octets
                .iter()
                .any(|o| o.len() != 2 || !o.chars().all(|c| c.is_ascii_hexdigit()))
        {
            return Err(invalid());
        }

        let canonical = octets
            .iter()
            .map(|o| o.to_ascii_uppercase())
            .collect::<Vec<_>>()
            .join(":");
        Ok(Self(Arc::from(canonical)))
    }

    /// Get the canonical string form.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DeviceAddress {
    type Err = PayloadParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Deref for DeviceAddress {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for DeviceAddress {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DeviceAddress {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceAddress({:?})", self.0)
    }
}

impl PartialEq for DeviceAddress {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for DeviceAddress {}

impl PartialEq<str> for DeviceAddress {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for DeviceAddress {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

// Same hash as str so HashMap<DeviceAddress, _> can be queried with &str
impl Hash for DeviceAddress {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for DeviceAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DeviceAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
