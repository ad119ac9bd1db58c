//! Allow-list of phones to switch into accessory mode
//!
//! Entries are plain vendor/product pairs. The list starts from the config
//! file and is edited at runtime through the control socket.

use std::fmt;
use std::str::FromStr;

use aoa_hid::DevicePredicate;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::info;

/// Maximum number of allow-list entries
pub const MAX_KNOWN_DEVICES: usize = 25;

/// A USB vendor/product pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsbId {
    pub vendor: u16,
    pub product: u16,
}

impl UsbId {
    pub const fn new(vendor: u16, product: u16) -> Self {
        Self { vendor, product }
    }
}

impl fmt::Display for UsbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor, self.product)
    }
}

fn parse_hex(input: &str, part: &str) -> Result<u16, KnownDeviceError> {
    let digits = part
        .strip_prefix("0x")
        .or_else(|| part.strip_prefix("0X"))
        .unwrap_or(part);
    u16::from_str_radix(digits, 16).map_err(|e| KnownDeviceError::Parse {
        input: input.to_string(),
        reason: format!("\"{part}\": {e}"),
    })
}

impl FromStr for UsbId {
    type Err = KnownDeviceError;

    /// Accepts `vvvv:pppp` or `vvvv pppp`, hex, with optional `0x` prefixes
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parts: Vec<&str> = if trimmed.contains(':') {
            trimmed.split(':').map(str::trim).collect()
        } else {
            trimmed.split_whitespace().collect()
        };

        match parts.as_slice() {
            [vendor, product] => Ok(Self {
                vendor: parse_hex(s, vendor)?,
                product: parse_hex(s, product)?,
            }),
            _ => Err(KnownDeviceError::Parse {
                input: s.to_string(),
                reason: "expected \"vvvv:pppp\" or \"vvvv pppp\"".into(),
            }),
        }
    }
}

impl Serialize for UsbId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UsbId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KnownDeviceError {
    #[error("no more space for additional known devices (max {capacity})")]
    Full { capacity: usize },

    #[error("device {0} is not in the known device list")]
    NotFound(UsbId),

    #[error("invalid device id \"{input}\": {reason}")]
    Parse { input: String, reason: String },
}

/// Runtime-editable allow-list
#[derive(Debug, Default)]
pub struct KnownDevices {
    entries: RwLock<Vec<UsbId>>,
}

impl KnownDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from initial entries (duplicates collapse)
    pub fn with_entries(ids: impl IntoIterator<Item = UsbId>) -> Result<Self, KnownDeviceError> {
        let known = Self::new();
        for id in ids {
            known.add(id)?;
        }
        Ok(known)
    }

    /// Add an entry
    ///
    /// # Returns
    /// `false` if the pair was already present
    pub fn add(&self, id: UsbId) -> Result<bool, KnownDeviceError> {
        let mut entries = self.entries.write();
        if entries.contains(&id) {
            return Ok(false);
        }
        if entries.len() >= MAX_KNOWN_DEVICES {
            return Err(KnownDeviceError::Full {
                capacity: MAX_KNOWN_DEVICES,
            });
        }
        entries.push(id);
        info!(device = %id, "Known device added");
        Ok(true)
    }

    /// Remove an entry; the last entry takes its place
    pub fn remove(&self, id: UsbId) -> Result<(), KnownDeviceError> {
        let mut entries = self.entries.write();
        let index = entries
            .iter()
            .position(|entry| *entry == id)
            .ok_or(KnownDeviceError::NotFound(id))?;
        entries.swap_remove(index);
        info!(device = %id, "Known device removed");
        Ok(())
    }

    pub fn contains(&self, id: UsbId) -> bool {
        self.entries.read().contains(&id)
    }

    pub fn entries(&self) -> Vec<UsbId> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// One `vvvv:pppp` line per entry
    pub fn listing(&self) -> String {
        self.entries
            .read()
            .iter()
            .map(|id| format!("{id}\n"))
            .collect()
    }
}

impl DevicePredicate for KnownDevices {
    fn is_recognized(&self, vendor_id: u16, product_id: u16) -> bool {
        self.contains(UsbId::new(vendor_id, product_id))
    }
}
