//! Core types and data structures for the sensor bridge

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::KioskError;

/// Status byte reported by a sensor when an object is close
pub const STATUS_CLOSE: u8 = 0x43;

/// Status byte reported by a sensor when an object is far
pub const STATUS_FAR: u8 = 0x41;

/// Size of the buffer handed to the vendor SDK on every poll
pub const POLL_BUFFER_LEN: usize = 128;

/// Size of the status buffer returned by a light device
pub const LIGHT_STATUS_LEN: usize = 8;

/// Threshold level applied to presence sensors when none is given
pub const DEFAULT_IR_LEVEL: i32 = 1;

/// The two independently managed sensor subsystems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorClass {
    /// Class A: presence / IR distance sensor
    Presence,
    /// Class B: RGB status light with status read-back
    Light,
}

impl SensorClass {
    /// Both classes, in the order they are scanned
    pub const ALL: [SensorClass; 2] = [SensorClass::Presence, SensorClass::Light];

    /// Get a string representation for API paths and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorClass::Presence => "presence",
            SensorClass::Light => "light",
        }
    }
}

impl fmt::Display for SensorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorClass {
    type Err = KioskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a" | "presence" | "su" => Ok(SensorClass::Presence),
            "b" | "light" | "si" => Ok(SensorClass::Light),
            other => Err(KioskError::InvalidInput(format!(
                "Unknown sensor class '{}' (expected presence/a or light/b)",
                other
            ))),
        }
    }
}

/// Tri-state proximity status decoded from byte 1 of a status buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorStatus {
    Close,
    Far,
    Unknown,
}

impl SensorStatus {
    /// Map a raw status byte to its tri-state value
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            STATUS_CLOSE => SensorStatus::Close,
            STATUS_FAR => SensorStatus::Far,
            _ => SensorStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorStatus::Close => "CLOSE",
            SensorStatus::Far => "FAR",
            SensorStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded sensor sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorReading {
    /// 16-bit sensor value (low byte at index 2, high byte at index 3)
    pub value: u16,
    /// Proximity status from index 1
    pub status: SensorStatus,
}

impl SensorReading {
    /// Decode a vendor status buffer
    ///
    /// Layout: `[_, status, value_lo, value_hi, ...]`. Returns `None` when the
    /// buffer is shorter than four bytes.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < 4 {
            return None;
        }

        Some(Self {
            value: u16::from_le_bytes([buf[2], buf[3]]),
            status: SensorStatus::from_byte(buf[1]),
        })
    }
}

/// Parsed light status: colour channels and the active mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightStatus {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub mode: u8,
}

impl LightStatus {
    /// Parse the 8-byte light status buffer (bytes 1, 3, 5 and 6)
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < 7 {
            return None;
        }

        Some(Self {
            red: buf[1],
            green: buf[3],
            blue: buf[5],
            mode: buf[6],
        })
    }
}

/// Colour command for a light device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    /// Duration seconds component
    #[serde(default)]
    pub seconds: u32,
    /// Duration minutes component
    #[serde(default)]
    pub minutes: u32,
    /// Vendor display mode
    #[serde(default)]
    pub mode: u32,
}

impl Default for LedColor {
    fn default() -> Self {
        Self {
            red: 255,
            green: 255,
            blue: 255,
            seconds: 1,
            minutes: 0,
            mode: 0,
        }
    }
}

/// Parameters for starting a sensor session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenParams {
    /// Threshold level, only applied to presence sensors
    pub level: i32,
}

impl Default for OpenParams {
    fn default() -> Self {
        Self {
            level: DEFAULT_IR_LEVEL,
        }
    }
}

/// Observable lifecycle state of one sensor class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No port open, no poll scheduled
    Closed,
    /// Waiting for an access grant before opening
    PermissionPending,
    /// Port open, first poll not yet fired
    Open,
    /// Port open and the poll loop has ticked at least once
    Polling,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Closed => "closed",
            SessionPhase::PermissionPending => "permission_pending",
            SessionPhase::Open => "open",
            SessionPhase::Polling => "polling",
        }
    }
}
