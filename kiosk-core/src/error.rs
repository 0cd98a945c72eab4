//! Error types for the kiosk sensor bridge

use thiserror::Error;

/// Core error type for sensor bridge operations
#[derive(Error, Debug)]
pub enum KioskError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Named port is absent from the current device registry
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The operating system declined access to the device
    #[error("Permission denied for device: {0}")]
    PermissionDenied(String),

    /// Vendor open-port call returned a nonzero result code
    #[error("Failed to open port {port}: vendor code {code}")]
    VendorOpen { port: String, code: i32 },

    /// Vendor status read returned a nonzero result code
    #[error("Failed to read status from {port}: vendor code {code}")]
    StatusRead { port: String, code: i32 },

    /// Any other vendor call returned a nonzero result code
    #[error("Vendor call on {port} failed: vendor code {code}")]
    Vendor { port: String, code: i32 },

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Invalid input or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Parsing errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The session manager is no longer running
    #[error("Session manager is not running")]
    SessionClosed,
}

impl KioskError {
    /// Short machine-readable code used in notifications and API errors
    pub fn code(&self) -> &'static str {
        match self {
            KioskError::Config(_) => "CONFIG",
            KioskError::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            KioskError::PermissionDenied(_) => "PERMISSION_DENIED",
            KioskError::VendorOpen { .. } => "OPEN_FAILED",
            KioskError::StatusRead { .. } => "STATUS_ERROR",
            KioskError::Vendor { .. } => "VENDOR_ERROR",
            KioskError::Serial(_) => "SERIAL_ERROR",
            KioskError::InvalidInput(_) => "INVALID_INPUT",
            KioskError::Parse(_) => "PARSE_ERROR",
            KioskError::Io(_) => "IO_ERROR",
            KioskError::Serialization(_) => "SERIALIZATION_ERROR",
            KioskError::Timeout(_) => "TIMEOUT",
            KioskError::SessionClosed => "SESSION_CLOSED",
        }
    }

    /// Vendor result code carried by the error, if it came from a vendor call
    pub fn vendor_code(&self) -> Option<i32> {
        match self {
            KioskError::VendorOpen { code, .. }
            | KioskError::StatusRead { code, .. }
            | KioskError::Vendor { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type alias for sensor bridge operations
pub type Result<T> = std::result::Result<T, KioskError>;

impl From<serde_json::Error> for KioskError {
    fn from(err: serde_json::Error) -> Self {
        KioskError::Serialization(err.to_string())
    }
}
