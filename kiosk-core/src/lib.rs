//! kiosk-core
//!
//! Shared types, status decoding, notifications, and configuration for the
//! kiosk sensor bridge. This crate is used by the hardware crate, the daemon,
//! and the CLI.

pub mod api;
pub mod config;
pub mod device;
pub mod error;
pub mod notification;
pub mod types;

// Re-export commonly used types
pub use config::{default_config_path, ClassConfig, PermissionPolicy, StaticConfig};
pub use device::{AdapterFamily, DeviceFilter, UsbDevice};
pub use error::*;
pub use notification::{ErrorInfo, Notification};
pub use types::*;
