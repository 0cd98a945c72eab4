//! Sensor port - command protocol for presence sensors and status lights
//!
//! Every request is `>` followed by the command byte and its arguments as hex.
//! Replies are `<OK>`, `<DATA|..>` or `<ERR|code>`.

use crate::serial_driver::{SerialDriver, SerialTransport};
use kiosk_core::{KioskError, LedColor, Result};
use std::fmt::Write;
use tracing::{debug, error};

/// Commands understood by the sensor firmware
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Command {
    /// Read the raw status buffer (0x10)
    GetStatus = 0x10,
    /// Set the presence threshold level (0x11)
    SetThreshold = 0x11,
    /// Set the light colour and duration (0x20)
    SetColor = 0x20,
    /// Flash mode (0x21)
    Flash = 0x21,
    /// Smooth colour cycling (0x22)
    Smooth = 0x22,
    /// Stop any running light effect (0x23)
    Stop = 0x23,
    /// Breathe mode with a pattern number (0x24)
    Breathe = 0x24,
    /// Firmware version string (0x06)
    GetFirmware = 0x06,
}

/// Parsed reply line
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reply {
    Ok,
    Data(String),
    Err(i32),
}

/// One open sensor or light port
///
/// Generic over the transport so tests can run without hardware.
pub struct SensorPort<T: SerialTransport + ?Sized = dyn SerialTransport> {
    transport: Box<T>,
}

impl SensorPort {
    /// Wrap an opened serial driver
    pub fn new(driver: SerialDriver) -> Self {
        Self {
            transport: Box::new(driver),
        }
    }
}

impl<T: SerialTransport + ?Sized> SensorPort<T> {
    /// Create a port over any transport
    pub fn with_transport(transport: Box<T>) -> Self {
        Self { transport }
    }

    pub fn path(&self) -> &str {
        self.transport.port_path()
    }

    async fn send_command(&mut self, cmd: Command, data: &[u8]) -> Result<Reply> {
        let mut payload = format!(">{:02X}", cmd as u8);
        for byte in data {
            // write! to String is infallible
            let _ = write!(payload, "{:02X}", byte);
        }

        debug!("Sending command: {:?} with payload: {}", cmd, payload);

        let response = self.transport.transaction(&payload).await?;
        self.parse_response(response)
    }

    fn parse_response(&self, response: Vec<String>) -> Result<Reply> {
        let line = response
            .iter()
            .find(|line| line.starts_with('<'))
            .ok_or_else(|| {
                error!("No valid response found in: {:?}", response);
                KioskError::Parse("No valid response received".to_string())
            })?;

        let body = line.trim_start_matches('<').trim_end_matches('>');
        let (tag, rest) = match body.split_once('|') {
            Some((tag, rest)) => (tag, Some(rest)),
            None => (body, None),
        };

        match (tag, rest) {
            ("OK", _) => Ok(Reply::Ok),
            ("DATA", Some(data)) => Ok(Reply::Data(data.to_string())),
            ("ERR", Some(code)) => code
                .trim()
                .parse::<i32>()
                .map(Reply::Err)
                .map_err(|e| KioskError::Parse(format!("Invalid error code '{}': {}", code, e))),
            _ => Err(KioskError::Parse(format!("Unexpected response: {}", line))),
        }
    }

    /// Send a command that only acknowledges
    async fn expect_ok(&mut self, cmd: Command, data: &[u8]) -> Result<()> {
        match self.send_command(cmd, data).await? {
            Reply::Ok => Ok(()),
            Reply::Err(code) => Err(KioskError::Vendor {
                port: self.path().to_string(),
                code,
            }),
            Reply::Data(data) => Err(KioskError::Parse(format!(
                "Unexpected data reply to {:?}: {}",
                cmd, data
            ))),
        }
    }

    /// Send a command that returns a data payload
    async fn expect_data(&mut self, cmd: Command, data: &[u8]) -> Result<String> {
        match self.send_command(cmd, data).await? {
            Reply::Data(data) => Ok(data),
            Reply::Err(code) => Err(KioskError::Vendor {
                port: self.path().to_string(),
                code,
            }),
            Reply::Ok => Err(KioskError::Parse(format!(
                "Missing data in reply to {:?}",
                cmd
            ))),
        }
    }

    /// Read the status buffer into `buf`
    ///
    /// The device sends at most `buf.len()` bytes; the remainder is zeroed.
    pub async fn read_status(&mut self, buf: &mut [u8]) -> Result<()> {
        let len = u8::try_from(buf.len()).unwrap_or(u8::MAX);
        let hex = self.expect_data(Command::GetStatus, &[len]).await?;
        let bytes = decode_hex(&hex)?;

        buf.fill(0);
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Ok(())
    }

    /// Set the presence threshold level
    pub async fn set_threshold(&mut self, level: i32) -> Result<()> {
        let level = u8::try_from(level).map_err(|_| {
            KioskError::InvalidInput(format!("Threshold level {} is out of range 0-255", level))
        })?;
        self.expect_ok(Command::SetThreshold, &[level]).await
    }

    /// Set the light colour
    ///
    /// Wire layout: R, G, B, seconds (big-endian u16), minutes, mode.
    pub async fn set_color(&mut self, color: &LedColor) -> Result<()> {
        let seconds = u16::try_from(color.seconds).map_err(|_| {
            KioskError::InvalidInput(format!("seconds {} is out of range", color.seconds))
        })?;
        let minutes = u8::try_from(color.minutes).map_err(|_| {
            KioskError::InvalidInput(format!("minutes {} is out of range", color.minutes))
        })?;
        let mode = u8::try_from(color.mode)
            .map_err(|_| KioskError::InvalidInput(format!("mode {} is out of range", color.mode)))?;

        let [sec_hi, sec_lo] = seconds.to_be_bytes();
        self.expect_ok(
            Command::SetColor,
            &[color.red, color.green, color.blue, sec_hi, sec_lo, minutes, mode],
        )
        .await
    }

    pub async fn flash(&mut self) -> Result<()> {
        self.expect_ok(Command::Flash, &[]).await
    }

    pub async fn smooth(&mut self) -> Result<()> {
        self.expect_ok(Command::Smooth, &[]).await
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.expect_ok(Command::Stop, &[]).await
    }

    pub async fn breathe(&mut self, pattern: u32) -> Result<()> {
        let pattern = u8::try_from(pattern).map_err(|_| {
            KioskError::InvalidInput(format!("Breathe pattern {} is out of range", pattern))
        })?;
        self.expect_ok(Command::Breathe, &[pattern]).await
    }

    /// Firmware version reported by the device
    pub async fn firmware_version(&mut self) -> Result<String> {
        let version = self.expect_data(Command::GetFirmware, &[]).await?;
        Ok(version.trim().to_string())
    }
}

fn decode_hex(hex: &str) -> Result<Vec<u8>> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return Err(KioskError::Parse(format!(
            "Odd-length status payload: {}",
            hex
        )));
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|e| KioskError::Parse(format!("Invalid status byte '{}': {}", &hex[i..i + 2], e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Mock transport with shared queues so the test keeps a handle after boxing
    #[derive(Clone, Default)]
    struct MockTransport {
        responses: Arc<Mutex<VecDeque<Vec<String>>>>,
        sent_commands: Arc<Mutex<Vec<String>>>,
    }

    impl MockTransport {
        fn queue_response(&self, line: &str) {
            self.responses
                .lock()
                .unwrap()
                .push_back(vec![line.to_string()]);
        }

        fn sent(&self) -> Vec<String> {
            self.sent_commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SerialTransport for MockTransport {
        async fn transaction(&mut self, command: &str) -> Result<Vec<String>> {
            self.sent_commands.lock().unwrap().push(command.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| KioskError::Timeout("No response queued".to_string()))
        }

        fn port_path(&self) -> &str {
            "/dev/ttyMOCK0"
        }
    }

    fn port_with(mock: &MockTransport) -> SensorPort<MockTransport> {
        SensorPort::with_transport(Box::new(mock.clone()))
    }

    #[tokio::test]
    async fn test_read_status_fills_buffer() {
        let mock = MockTransport::default();
        mock.queue_response("<DATA|00411000>");
        let mut port = port_with(&mock);

        let mut buf = [0xFFu8; 8];
        port.read_status(&mut buf).await.unwrap();

        assert_eq!(buf, [0x00, 0x41, 0x10, 0x00, 0, 0, 0, 0]);
        assert_eq!(mock.sent(), vec![">1008"]);
    }

    #[tokio::test]
    async fn test_read_status_truncates_long_payload() {
        let mock = MockTransport::default();
        mock.queue_response("<DATA|0102030405>");
        let mut port = port_with(&mock);

        let mut buf = [0u8; 2];
        port.read_status(&mut buf).await.unwrap();
        assert_eq!(buf, [0x01, 0x02]);
    }

    #[tokio::test]
    async fn test_poll_buffer_length_is_capped() {
        let mock = MockTransport::default();
        mock.queue_response("<DATA|00>");
        let mut port = port_with(&mock);

        let mut buf = [0u8; 300];
        port.read_status(&mut buf).await.unwrap();
        assert_eq!(mock.sent(), vec![">10FF"]);
    }

    #[tokio::test]
    async fn test_error_reply_carries_vendor_code() {
        let mock = MockTransport::default();
        mock.queue_response("<ERR|-12>");
        let mut port = port_with(&mock);

        let err = port.flash().await.unwrap_err();
        match err {
            KioskError::Vendor { port, code } => {
                assert_eq!(port, "/dev/ttyMOCK0");
                assert_eq!(code, -12);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_set_color_wire_format() {
        let mock = MockTransport::default();
        mock.queue_response("<OK>");
        let mut port = port_with(&mock);

        let color = LedColor {
            red: 0xFF,
            green: 0x80,
            blue: 0x00,
            seconds: 300,
            minutes: 2,
            mode: 1,
        };
        port.set_color(&color).await.unwrap();
        assert_eq!(mock.sent(), vec![">20FF8000012C0201"]);
    }

    #[tokio::test]
    async fn test_set_color_rejects_out_of_range() {
        let mock = MockTransport::default();
        let mut port = port_with(&mock);

        let color = LedColor {
            seconds: 70_000,
            ..LedColor::default()
        };
        assert!(matches!(
            port.set_color(&color).await,
            Err(KioskError::InvalidInput(_))
        ));
        assert!(mock.sent().is_empty());
    }

    #[tokio::test]
    async fn test_set_threshold() {
        let mock = MockTransport::default();
        mock.queue_response("<OK>");
        let mut port = port_with(&mock);

        port.set_threshold(1).await.unwrap();
        assert_eq!(mock.sent(), vec![">1101"]);

        assert!(port.set_threshold(-1).await.is_err());
    }

    #[tokio::test]
    async fn test_light_modes() {
        let mock = MockTransport::default();
        for _ in 0..4 {
            mock.queue_response("<OK>");
        }
        let mut port = port_with(&mock);

        port.flash().await.unwrap();
        port.smooth().await.unwrap();
        port.stop().await.unwrap();
        port.breathe(3).await.unwrap();

        assert_eq!(mock.sent(), vec![">21", ">22", ">23", ">2403"]);
    }

    #[tokio::test]
    async fn test_firmware_version() {
        let mock = MockTransport::default();
        mock.queue_response("<DATA|SI-2.4.1>");
        let mut port = port_with(&mock);

        assert_eq!(port.firmware_version().await.unwrap(), "SI-2.4.1");
    }

    #[tokio::test]
    async fn test_unexpected_reply_is_parse_error() {
        let mock = MockTransport::default();
        mock.queue_response("<DATA|00>");
        let mut port = port_with(&mock);

        assert!(matches!(port.stop().await, Err(KioskError::Parse(_))));
    }

    #[tokio::test]
    async fn test_no_response_line() {
        let mock = MockTransport::default();
        mock.responses
            .lock()
            .unwrap()
            .push_back(vec!["booting".to_string()]);
        let mut port = port_with(&mock);

        assert!(matches!(port.smooth().await, Err(KioskError::Parse(_))));
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex("0aFF").unwrap(), vec![0x0A, 0xFF]);
        assert!(decode_hex("abc").is_err());
        assert!(decode_hex("zz").is_err());
    }

    #[test]
    fn test_command_values() {
        assert_eq!(Command::GetStatus as u8, 0x10);
        assert_eq!(Command::SetColor as u8, 0x20);
        assert_eq!(Command::Breathe as u8, 0x24);
        assert_eq!(Command::GetFirmware as u8, 0x06);
    }
}
