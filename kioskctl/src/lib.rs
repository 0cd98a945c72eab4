//! Kiosk sensor bridge CLI library
//!
//! This library provides the core functionality for the `kioskctl` tool.
//!
//! # Public API
//!
//! The primary public API is the [`client::KioskClient`] which provides
//! programmatic access to the daemon's REST API and notification stream.
//! Configuration types are available via [`config::CliConfig`] and
//! [`config::ConfigBuilder`].
//!
//! ```no_run
//! use kioskctl::client::KioskClient;
//! use kiosk_core::SensorClass;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = KioskClient::with_config(
//!     "http://localhost:3080".to_string(),
//!     10,  // timeout in seconds
//!     3,   // max retries
//!     Duration::from_millis(500),  // initial retry delay
//! )?;
//!
//! let ports = client.list_ports(SensorClass::Presence).await?;
//! println!("Presence ports: {:?}", ports.ports);
//! # Ok(())
//! # }
//! ```

// Internal CLI implementation - not part of public API
#[doc(hidden)]
pub mod cli;

/// HTTP client for communicating with the daemon.
pub mod client;

/// Configuration types for the CLI tool.
pub mod config;

// Internal formatting functions - not part of public API
#[doc(hidden)]
pub mod format;

#[cfg(test)]
pub mod test_utils;
