//! API models for the sensor bridge REST API
//!
//! This module contains request and response models shared by the daemon
//! and the CLI client.

use crate::types::{LedColor, SensorClass, SessionPhase};
use serde::{Deserialize, Serialize};

/// Generic API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ApiResponse<T> {
    #[serde(rename = "success")]
    Success { data: T },
    #[serde(rename = "error")]
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn success(data: T) -> Self {
        Self::Success { data }
    }

    /// Create an error response
    pub fn error(error: String) -> Self {
        Self::Error { error, code: None }
    }

    /// Create an error response with a machine-readable code
    pub fn error_with_code(error: String, code: impl Into<String>) -> Self {
        Self::Error {
            error,
            code: Some(code.into()),
        }
    }
}

/// Daemon information response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    /// Daemon version
    pub version: String,
    /// Whether the simulated SDK is in use
    pub mock_mode: bool,
    /// Uptime in seconds
    pub uptime: u64,
    /// Number of devices in the live registry
    pub device_count: usize,
    /// Per-class session snapshot
    pub sessions: Vec<SessionInfo>,
}

/// Port listing for one sensor class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortsResponse {
    pub class: SensorClass,
    pub ports: Vec<String>,
}

/// Snapshot of one class session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub class: SensorClass,
    pub phase: SessionPhase,
    /// Port the session is bound to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Threshold level (presence sensors only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i32>,
    /// Whether a poll is currently scheduled
    pub poll_scheduled: bool,
}

/// Session listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionInfo>,
}

/// Start sensor request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    /// Port name as returned by the port listing
    pub port: String,
    /// Threshold level for presence sensors (defaults to 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i32>,
}

/// Request naming a single port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortRequest {
    pub port: String,
}

/// Raw open request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPortRequest {
    pub port: String,
    /// Baud rate for the vendor open call (0 lets the SDK choose)
    #[serde(default)]
    pub baud_rate: u32,
}

/// Explicit permission request result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionResponse {
    pub port: String,
    /// `true` if a request was issued, `false` if access was already held
    pub requested: bool,
}

/// Set colour request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedColorRequest {
    pub port: String,
    #[serde(flatten)]
    pub color: LedColor,
}

/// Breathe mode request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreatheRequest {
    pub port: String,
    #[serde(default)]
    pub pattern: u32,
}

/// Result code of a pass-through vendor call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorCodeResponse {
    pub port: String,
    pub code: i32,
}

/// Port open state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortOpenResponse {
    pub port: String,
    pub open: bool,
}

/// Raw status bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawStatusResponse {
    pub port: String,
    pub bytes: Vec<u8>,
}

/// Firmware version string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmwareResponse {
    pub port: String,
    pub version: String,
}

/// Vendor SDK port list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComListResponse {
    pub ports: Vec<String>,
}

/// Result of re-detecting adapter ports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    /// Number of legacy alias ports now available
    pub alias_count: usize,
}
