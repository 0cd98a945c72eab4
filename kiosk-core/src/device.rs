//! USB device descriptors and VID/PID matching
//!
//! Devices are identified by their stable OS name (the port path). Class
//! membership is decided by [`DeviceFilter`] patterns, and the multi-port
//! serial adapter family is described by [`AdapterFamily`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::KioskError;

/// A USB device as seen in the OS registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbDevice {
    /// Stable device name (port path, e.g. `/dev/ttyUSB0`)
    pub name: String,
    /// USB vendor ID
    pub vendor_id: u16,
    /// USB product ID
    pub product_id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
}

impl UsbDevice {
    /// Create a device with only the identifying fields set
    pub fn new(name: impl Into<String>, vendor_id: u16, product_id: u16) -> Self {
        Self {
            name: name.into(),
            vendor_id,
            product_id,
            serial_number: None,
            manufacturer: None,
            product: None,
        }
    }
}

impl fmt::Display for UsbDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:04X}:{:04X})",
            self.name, self.vendor_id, self.product_id
        )
    }
}

/// A `VID:PID` pattern, either half may be a `*` wildcard
///
/// Accepted forms: `"0x0f10:0x0100"`, `"0f10:0100"`, `"0x0f10:*"`, `"*:*"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceFilter {
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
}

impl DeviceFilter {
    /// Exact VID/PID match
    pub const fn exact(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id: Some(vendor_id),
            product_id: Some(product_id),
        }
    }

    /// Any product of a vendor
    pub const fn vendor(vendor_id: u16) -> Self {
        Self {
            vendor_id: Some(vendor_id),
            product_id: None,
        }
    }

    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id.map_or(true, |v| v == vendor_id)
            && self.product_id.map_or(true, |p| p == product_id)
    }

    /// Check a VID/PID pair against a filter list
    pub fn any_match(filters: &[DeviceFilter], vendor_id: u16, product_id: u16) -> bool {
        filters.iter().any(|f| f.matches(vendor_id, product_id))
    }

    fn parse_part(part: &str) -> Result<Option<u16>, KioskError> {
        let part = part.trim();
        if part == "*" {
            return Ok(None);
        }

        let digits = part
            .strip_prefix("0x")
            .or_else(|| part.strip_prefix("0X"))
            .unwrap_or(part);

        u16::from_str_radix(digits, 16)
            .map(Some)
            .map_err(|e| KioskError::Config(format!("Invalid USB id '{}': {}", part, e)))
    }
}

impl FromStr for DeviceFilter {
    type Err = KioskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (vid, pid) = s.split_once(':').ok_or_else(|| {
            KioskError::Config(format!(
                "Invalid device filter '{}' (expected VID:PID, e.g. 0x0f10:0x0100)",
                s
            ))
        })?;

        Ok(Self {
            vendor_id: Self::parse_part(vid)?,
            product_id: Self::parse_part(pid)?,
        })
    }
}

impl TryFrom<String> for DeviceFilter {
    type Error = KioskError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceFilter> for String {
    fn from(filter: DeviceFilter) -> Self {
        filter.to_string()
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.vendor_id {
            Some(v) => write!(f, "0x{:04x}:", v)?,
            None => f.write_str("*:")?,
        }
        match self.product_id {
            Some(p) => write!(f, "0x{:04x}", p),
            None => f.write_str("*"),
        }
    }
}

/// Multi-port USB serial adapter family whose ports are exposed as legacy aliases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterFamily {
    /// Adapter vendor ID
    pub vendor_id: u16,
    /// First product ID of the family
    pub product_id_min: u16,
    /// Last product ID of the family (inclusive)
    pub product_id_max: u16,
    /// Alias prefix; ports are named `{prefix}{n}` starting at 1
    pub alias_prefix: String,
}

impl Default for AdapterFamily {
    fn default() -> Self {
        Self {
            vendor_id: 0x9710,
            product_id_min: 0x7800,
            product_id_max: 0x784F,
            alias_prefix: "SerialCOM".to_string(),
        }
    }
}

impl AdapterFamily {
    pub fn product_range(&self) -> RangeInclusive<u16> {
        self.product_id_min..=self.product_id_max
    }

    /// Whether a device belongs to the adapter family
    pub fn contains(&self, device: &UsbDevice) -> bool {
        device.vendor_id == self.vendor_id && self.product_range().contains(&device.product_id)
    }

    /// Alias name for a zero-based adapter port index
    pub fn alias(&self, index: usize) -> String {
        format!("{}{}", self.alias_prefix, index + 1)
    }

    /// Zero-based port index for an alias name, if it is one
    pub fn alias_index(&self, name: &str) -> Option<usize> {
        let n: usize = name.strip_prefix(&self.alias_prefix)?.parse().ok()?;
        n.checked_sub(1)
    }
}
