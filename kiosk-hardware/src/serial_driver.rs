//! Serial driver for low-level sensor communication
//!
//! Sensors and lights speak a line-oriented ASCII protocol: commands are sent
//! as `>CCDD..` hex strings, the device answers with one line starting with `<`.

use async_trait::async_trait;
use kiosk_core::{KioskError, Result};
use std::time::Duration;
use tokio::time::timeout;
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, warn};

/// Trait for serial transport abstraction
///
/// Lets `SensorPort` run against a mock transport in tests.
#[async_trait]
pub trait SerialTransport: Send {
    /// Send a command and wait for response lines
    async fn transaction(&mut self, command: &str) -> Result<Vec<String>>;

    /// Get the port path this transport is bound to
    fn port_path(&self) -> &str;
}

/// Serial driver for one sensor port
pub struct SerialDriver {
    port: SerialStream,
    port_path: String,
    suffix: String,
    timeout_duration: Duration,
    debug_uart: bool,
}

impl SerialDriver {
    /// Open a serial port
    ///
    /// # Arguments
    /// * `port_path` - Path to the serial device (e.g., "/dev/ttyUSB0")
    /// * `baud_rate` - Line speed
    /// * `timeout_ms` - Timeout in milliseconds for read/write operations
    /// * `debug_uart` - Log every line sent and received
    pub fn new(port_path: &str, baud_rate: u32, timeout_ms: u64, debug_uart: bool) -> Result<Self> {
        debug!("Opening serial port: {} @ {} baud", port_path, baud_rate);

        let port = tokio_serial::new(port_path, baud_rate)
            .timeout(Duration::from_millis(timeout_ms))
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                error!("Failed to open serial port {}: {}", port_path, e);
                KioskError::Serial(format!("Failed to open serial port: {}", e))
            })?;

        debug!("Serial port opened successfully");

        Ok(Self {
            port,
            port_path: port_path.to_string(),
            suffix: "\r\n".to_string(),
            timeout_duration: Duration::from_millis(timeout_ms),
            debug_uart,
        })
    }

    async fn send(&mut self, command: &str) -> Result<()> {
        use tokio::io::AsyncWriteExt;

        let full_command = format!("{}{}", command, self.suffix);

        if self.debug_uart {
            debug!("TX {}: {:?}", self.port_path, full_command);
        }

        timeout(
            self.timeout_duration,
            self.port.write_all(full_command.as_bytes()),
        )
        .await
        .map_err(|_| KioskError::Timeout("Write operation timed out".to_string()))?
        .map_err(|e| {
            error!("Write to {} failed: {}", self.port_path, e);
            KioskError::Serial(format!("Write failed: {}", e))
        })?;

        timeout(self.timeout_duration, self.port.flush())
            .await
            .map_err(|_| KioskError::Timeout("Flush operation timed out".to_string()))?
            .map_err(|e| KioskError::Serial(format!("Flush failed: {}", e)))?;

        Ok(())
    }

    /// Read lines until one starts with '<'
    async fn read_until_response(&mut self) -> Result<Vec<String>> {
        use tokio::io::{AsyncBufReadExt, BufReader};

        let debug_uart = self.debug_uart;
        let port_path = self.port_path.clone();
        let mut reader = BufReader::new(&mut self.port);

        let result = timeout(self.timeout_duration, async {
            let mut lines = Vec::new();
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        warn!("{} returned EOF", port_path);
                        return Err(KioskError::Serial(
                            "device disconnected: serial port returned EOF".to_string(),
                        ));
                    }
                    Ok(_) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }
                        if debug_uart {
                            debug!("RX {}: {:?}", port_path, line);
                        }
                        let done = line.starts_with('<');
                        lines.push(line);
                        if done {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Read error on {}: {}", port_path, e);
                        return Err(KioskError::Serial(format!("Read error: {}", e)));
                    }
                }
            }
            Ok(lines)
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(KioskError::Timeout("Read operation timed out".to_string())),
        }
    }
}

#[async_trait]
impl SerialTransport for SerialDriver {
    async fn transaction(&mut self, command: &str) -> Result<Vec<String>> {
        if let Err(e) = self.port.clear(tokio_serial::ClearBuffer::Input) {
            warn!("Failed to clear input buffer on {}: {}", self.port_path, e);
        }

        self.send(command).await?;
        self.read_until_response().await
    }

    fn port_path(&self) -> &str {
        &self.port_path
    }
}

/// Determine if an error means the device went away
///
/// Timeouts are treated as transient.
pub fn is_disconnect_error(err: &KioskError) -> bool {
    match err {
        KioskError::Serial(msg) => {
            let msg_lower = msg.to_lowercase();
            msg_lower.contains("broken pipe")
                || msg_lower.contains("no such device")
                || msg_lower.contains("device disconnected")
                || msg_lower.contains("device not configured")
                || msg_lower.contains("input/output error")
        }
        KioskError::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::NotFound
        ),
        _ => false,
    }
}
