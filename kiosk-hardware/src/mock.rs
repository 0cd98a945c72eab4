//! Simulated vendor SDK
//!
//! Used by the daemon's `--mock` mode and by tests. Cloned handles share one
//! state, so a test can keep a handle while the session manager owns another.

use async_trait::async_trait;
use kiosk_core::{KioskError, LedColor, Result, STATUS_CLOSE, STATUS_FAR};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::sdk::{codes, VendorSdk};

/// One recorded SDK call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Open { port: String, baud_rate: u32 },
    Close(String),
    SetThreshold { port: String, level: i32 },
    ReadStatus(String),
    SetColor { port: String, color: LedColor },
    Flash(String),
    Smooth(String),
    Stop(String),
    Breathe { port: String, pattern: u32 },
    Firmware(String),
}

#[derive(Debug, Default)]
struct MockState {
    /// Ports on the simulated bus
    visible_ports: BTreeSet<String>,
    open_ports: HashSet<String>,
    open_failures: HashMap<String, i32>,
    status_failure: Option<i32>,
    command_failure: Option<i32>,
    frames: HashMap<String, VecDeque<Vec<u8>>>,
    calls: Vec<MockCall>,
    ticks: u16,
}

/// In-memory vendor SDK
#[derive(Debug, Clone, Default)]
pub struct MockSdk {
    state: Arc<Mutex<MockState>>,
}

impl MockSdk {
    pub fn new() -> Self {
        Self::default()
    }

    /// SDK that sees `ports` on its simulated bus
    pub fn with_ports<I, S>(ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sdk = Self::default();
        sdk.state()
            .visible_ports
            .extend(ports.into_iter().map(Into::into));
        sdk
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `open_port` on `port` fail with `code`
    pub fn fail_open(&self, port: &str, code: i32) {
        self.state().open_failures.insert(port.to_string(), code);
    }

    /// Make every status read fail with `code`, or clear with `None`
    pub fn fail_status(&self, code: Option<i32>) {
        self.state().status_failure = code;
    }

    /// Make every light/threshold command fail with `code`, or clear with `None`
    pub fn fail_commands(&self, code: Option<i32>) {
        self.state().command_failure = code;
    }

    /// Queue a status frame returned by the next read on `port`
    pub fn queue_status(&self, port: &str, frame: Vec<u8>) {
        self.state()
            .frames
            .entry(port.to_string())
            .or_default()
            .push_back(frame);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    /// Count recorded calls matching a predicate
    pub fn count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Synthetic frame: value ramps 0..=511, status flips to CLOSE below 128
    fn synthetic_frame(state: &mut MockState) -> Vec<u8> {
        state.ticks = state.ticks.wrapping_add(16) % 512;
        let value = state.ticks;
        let status = if value < 128 { STATUS_CLOSE } else { STATUS_FAR };
        let [lo, hi] = value.to_le_bytes();
        vec![0x00, status, lo, hi, 0x00, 0x00, 0x00, 0x00]
    }

    fn command(&self, port: &str, call: MockCall) -> Result<()> {
        let mut state = self.state();
        state.calls.push(call);

        if !state.open_ports.contains(port) {
            return Err(KioskError::Vendor {
                port: port.to_string(),
                code: codes::NOT_OPEN,
            });
        }
        match state.command_failure {
            Some(code) => Err(KioskError::Vendor {
                port: port.to_string(),
                code,
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl VendorSdk for MockSdk {
    async fn open_port(&mut self, port: &str, baud_rate: u32) -> Result<()> {
        let mut state = self.state();
        state.calls.push(MockCall::Open {
            port: port.to_string(),
            baud_rate,
        });

        if let Some(code) = state.open_failures.get(port) {
            return Err(KioskError::VendorOpen {
                port: port.to_string(),
                code: *code,
            });
        }

        debug!("mock: opened {}", port);
        state.open_ports.insert(port.to_string());
        Ok(())
    }

    async fn close_port(&mut self, port: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(MockCall::Close(port.to_string()));
        state.open_ports.remove(port);
        Ok(())
    }

    fn is_open_port(&self, port: &str) -> bool {
        self.state().open_ports.contains(port)
    }

    async fn set_threshold(&mut self, port: &str, level: i32) -> Result<()> {
        self.command(
            port,
            MockCall::SetThreshold {
                port: port.to_string(),
                level,
            },
        )
    }

    async fn read_status(&mut self, port: &str, buf: &mut [u8]) -> Result<()> {
        let mut state = self.state();
        state.calls.push(MockCall::ReadStatus(port.to_string()));

        let failure = if !state.open_ports.contains(port) {
            Some(codes::NOT_OPEN)
        } else {
            state.status_failure
        };
        if let Some(code) = failure {
            return Err(KioskError::StatusRead {
                port: port.to_string(),
                code,
            });
        }

        let queued = state.frames.get_mut(port).and_then(|q| q.pop_front());
        let frame = match queued {
            Some(frame) => frame,
            None => Self::synthetic_frame(&mut state),
        };

        buf.fill(0);
        let n = frame.len().min(buf.len());
        buf[..n].copy_from_slice(&frame[..n]);
        Ok(())
    }

    async fn set_led_color(&mut self, port: &str, color: &LedColor) -> Result<()> {
        self.command(
            port,
            MockCall::SetColor {
                port: port.to_string(),
                color: *color,
            },
        )
    }

    async fn set_flash(&mut self, port: &str) -> Result<()> {
        self.command(port, MockCall::Flash(port.to_string()))
    }

    async fn set_smooth(&mut self, port: &str) -> Result<()> {
        self.command(port, MockCall::Smooth(port.to_string()))
    }

    async fn set_stop(&mut self, port: &str) -> Result<()> {
        self.command(port, MockCall::Stop(port.to_string()))
    }

    async fn set_breathe(&mut self, port: &str, pattern: u32) -> Result<()> {
        self.command(
            port,
            MockCall::Breathe {
                port: port.to_string(),
                pattern,
            },
        )
    }

    async fn firmware_version(&mut self, port: &str) -> Result<String> {
        self.command(port, MockCall::Firmware(port.to_string()))?;
        Ok("MOCK-1.0.0".to_string())
    }

    /// Bus ports plus anything opened directly, sorted
    fn com_list(&self) -> Vec<String> {
        let state = self.state();
        let ports: BTreeSet<&String> = state
            .visible_ports
            .iter()
            .chain(state.open_ports.iter())
            .collect();
        ports.into_iter().cloned().collect()
    }
}
