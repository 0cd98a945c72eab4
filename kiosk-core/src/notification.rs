//! Asynchronous notifications relayed to the consuming application

use serde::{Deserialize, Serialize};

use crate::device::UsbDevice;
use crate::error::KioskError;
use crate::types::{SensorClass, SensorReading};

/// Error payload carried by a `sensor_error` notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable error code (see [`KioskError::code`])
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Vendor result code, when the failure came from a vendor call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_code: Option<i32>,
}

impl From<&KioskError> for ErrorInfo {
    fn from(err: &KioskError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            vendor_code: err.vendor_code(),
        }
    }
}

/// Every state transition the session manager reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    /// Port list for a class was recomputed
    PortsUpdated {
        class: SensorClass,
        ports: Vec<String>,
    },
    /// A USB device was plugged in
    DeviceAttached,
    /// A USB device was removed
    DeviceDetached {
        /// Class list the device was removed from, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class: Option<SensorClass>,
        device: String,
    },
    /// Access to a device was granted
    PermissionGranted { device: String },
    /// Access to a device was declined
    PermissionDenied {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class: Option<SensorClass>,
        device: String,
    },
    /// A sensor session opened its port and started polling
    SensorStarted { class: SensorClass, port: String },
    /// A sensor session was closed
    SensorStopped { class: SensorClass },
    /// A sensor operation failed
    SensorError {
        class: SensorClass,
        error: ErrorInfo,
    },
    /// A new sample was read
    SensorUpdate {
        class: SensorClass,
        #[serde(flatten)]
        reading: SensorReading,
    },
}

impl Notification {
    /// Build an error notification from a core error
    pub fn error(class: SensorClass, err: &KioskError) -> Self {
        Notification::SensorError {
            class,
            error: ErrorInfo::from(err),
        }
    }

    /// Event name as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Notification::PortsUpdated { .. } => "ports_updated",
            Notification::DeviceAttached => "device_attached",
            Notification::DeviceDetached { .. } => "device_detached",
            Notification::PermissionGranted { .. } => "permission_granted",
            Notification::PermissionDenied { .. } => "permission_denied",
            Notification::SensorStarted { .. } => "sensor_started",
            Notification::SensorStopped { .. } => "sensor_stopped",
            Notification::SensorError { .. } => "sensor_error",
            Notification::SensorUpdate { .. } => "sensor_update",
        }
    }

    /// Detached notification for a device
    pub fn detached(class: Option<SensorClass>, device: &UsbDevice) -> Self {
        Notification::DeviceDetached {
            class,
            device: device.name.clone(),
        }
    }
}
