//! Vendor SDK surface
//!
//! Port-addressed calls for presence sensors and status lights. Every failure
//! is reported as a [`KioskError`] carrying the vendor result code.

use async_trait::async_trait;
use kiosk_core::{KioskError, LedColor, Result};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::sensor_port::SensorPort;
use crate::serial_driver::{is_disconnect_error, SerialDriver};

/// Vendor result codes
pub mod codes {
    pub const OK: i32 = 0;
    pub const NOT_FOUND: i32 = -1;
    pub const ACCESS_DENIED: i32 = -2;
    pub const NOT_OPEN: i32 = -3;
    pub const IO: i32 = -4;
    pub const TIMEOUT: i32 = -5;
    pub const PROTOCOL: i32 = -6;
    pub const INVALID_ARGUMENT: i32 = -7;
}

/// Port-addressed vendor calls
///
/// Ports are addressed by device path. Alias resolution happens before a call
/// reaches the SDK.
#[async_trait]
pub trait VendorSdk: Send {
    /// Open a port. A baud rate of 0 selects the SDK default.
    async fn open_port(&mut self, port: &str, baud_rate: u32) -> Result<()>;

    /// Close a port. Closing a port that is not open succeeds.
    async fn close_port(&mut self, port: &str) -> Result<()>;

    fn is_open_port(&self, port: &str) -> bool;

    async fn set_threshold(&mut self, port: &str, level: i32) -> Result<()>;

    /// Fill `buf` with the device status buffer
    async fn read_status(&mut self, port: &str, buf: &mut [u8]) -> Result<()>;

    async fn set_led_color(&mut self, port: &str, color: &LedColor) -> Result<()>;

    async fn set_flash(&mut self, port: &str) -> Result<()>;

    async fn set_smooth(&mut self, port: &str) -> Result<()>;

    async fn set_stop(&mut self, port: &str) -> Result<()>;

    async fn set_breathe(&mut self, port: &str, pattern: u32) -> Result<()>;

    async fn firmware_version(&mut self, port: &str) -> Result<String>;

    /// Serial ports the SDK can see, open or not
    fn com_list(&self) -> Vec<String>;
}

/// Map an error to the vendor result code it represents
pub fn vendor_code_for(err: &KioskError) -> i32 {
    if let Some(code) = err.vendor_code() {
        return code;
    }

    match err {
        KioskError::DeviceNotFound(_) => codes::NOT_FOUND,
        KioskError::PermissionDenied(_) => codes::ACCESS_DENIED,
        KioskError::Timeout(_) => codes::TIMEOUT,
        KioskError::Parse(_) => codes::PROTOCOL,
        KioskError::InvalidInput(_) => codes::INVALID_ARGUMENT,
        KioskError::Serial(msg) => {
            let msg_lower = msg.to_lowercase();
            if msg_lower.contains("permission denied") {
                codes::ACCESS_DENIED
            } else if msg_lower.contains("no such file") || msg_lower.contains("not found") {
                codes::NOT_FOUND
            } else {
                codes::IO
            }
        }
        _ => codes::IO,
    }
}

/// Vendor SDK over the sensors' serial protocol
pub struct SerialSdk {
    ports: HashMap<String, SensorPort>,
    timeout_ms: u64,
    default_baud_rate: u32,
    debug_uart: bool,
}

impl SerialSdk {
    pub fn new(timeout_ms: u64, default_baud_rate: u32, debug_uart: bool) -> Self {
        Self {
            ports: HashMap::new(),
            timeout_ms,
            default_baud_rate,
            debug_uart,
        }
    }

    #[cfg(test)]
    pub(crate) fn insert_port(&mut self, port: &str, sensor: SensorPort) {
        self.ports.insert(port.to_string(), sensor);
    }

    fn port_mut(&mut self, port: &str) -> Result<&mut SensorPort> {
        self.ports.get_mut(port).ok_or_else(|| KioskError::Vendor {
            port: port.to_string(),
            code: codes::NOT_OPEN,
        })
    }

    /// Forget a port whose device went away so `is_open_port` stops reporting it
    fn note_failure(&mut self, port: &str, err: &KioskError) {
        if is_disconnect_error(err) {
            warn!("{} disconnected, dropping handle", port);
            self.ports.remove(port);
        }
    }

    /// Convert a port-level result into the SDK's error shape
    fn finish<T>(&mut self, port: &str, result: Result<T>) -> Result<T> {
        result.map_err(|e| {
            self.note_failure(port, &e);
            match e {
                KioskError::Vendor { .. } => e,
                other => KioskError::Vendor {
                    port: port.to_string(),
                    code: vendor_code_for(&other),
                },
            }
        })
    }
}

#[async_trait]
impl VendorSdk for SerialSdk {
    async fn open_port(&mut self, port: &str, baud_rate: u32) -> Result<()> {
        if self.ports.contains_key(port) {
            debug!("{} already open", port);
            return Ok(());
        }

        let baud_rate = if baud_rate == 0 {
            self.default_baud_rate
        } else {
            baud_rate
        };

        let driver = SerialDriver::new(port, baud_rate, self.timeout_ms, self.debug_uart).map_err(
            |e| KioskError::VendorOpen {
                port: port.to_string(),
                code: vendor_code_for(&e),
            },
        )?;

        info!("Opened {} @ {} baud", port, baud_rate);
        self.ports.insert(port.to_string(), SensorPort::new(driver));
        Ok(())
    }

    async fn close_port(&mut self, port: &str) -> Result<()> {
        if self.ports.remove(port).is_some() {
            info!("Closed {}", port);
        }
        Ok(())
    }

    fn is_open_port(&self, port: &str) -> bool {
        self.ports.contains_key(port)
    }

    async fn set_threshold(&mut self, port: &str, level: i32) -> Result<()> {
        let result = self.port_mut(port)?.set_threshold(level).await;
        self.finish(port, result)
    }

    async fn read_status(&mut self, port: &str, buf: &mut [u8]) -> Result<()> {
        let result = match self.ports.get_mut(port) {
            Some(sensor) => sensor.read_status(buf).await,
            None => {
                return Err(KioskError::StatusRead {
                    port: port.to_string(),
                    code: codes::NOT_OPEN,
                })
            }
        };

        result.map_err(|e| {
            self.note_failure(port, &e);
            KioskError::StatusRead {
                port: port.to_string(),
                code: vendor_code_for(&e),
            }
        })
    }

    async fn set_led_color(&mut self, port: &str, color: &LedColor) -> Result<()> {
        let result = self.port_mut(port)?.set_color(color).await;
        self.finish(port, result)
    }

    async fn set_flash(&mut self, port: &str) -> Result<()> {
        let result = self.port_mut(port)?.flash().await;
        self.finish(port, result)
    }

    async fn set_smooth(&mut self, port: &str) -> Result<()> {
        let result = self.port_mut(port)?.smooth().await;
        self.finish(port, result)
    }

    async fn set_stop(&mut self, port: &str) -> Result<()> {
        let result = self.port_mut(port)?.stop().await;
        self.finish(port, result)
    }

    async fn set_breathe(&mut self, port: &str, pattern: u32) -> Result<()> {
        let result = self.port_mut(port)?.breathe(pattern).await;
        self.finish(port, result)
    }

    async fn firmware_version(&mut self, port: &str) -> Result<String> {
        let result = self.port_mut(port)?.firmware_version().await;
        self.finish(port, result)
    }

    fn com_list(&self) -> Vec<String> {
        match tokio_serial::available_ports() {
            Ok(ports) => {
                let names: Vec<String> = ports.into_iter().map(|p| p.port_name).collect();
                debug!("com_list: {} serial ports", names.len());
                if self.debug_uart {
                    debug!("com_list: {:?}", names);
                }
                names
            }
            Err(e) => {
                warn!("Failed to enumerate serial ports: {}", e);
                Vec::new()
            }
        }
    }
}
