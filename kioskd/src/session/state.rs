//! Per-class session state

use kiosk_core::api::SessionInfo;
use kiosk_core::{OpenParams, SensorClass, SessionPhase, UsbDevice};
use std::time::Duration;
use tokio::sync::mpsc;

use super::events::SessionEvent;
use super::poll::ScheduledPoll;

/// Open/poll state of one sensor class
#[derive(Debug)]
pub(crate) struct ClassSession {
    class: SensorClass,
    /// Port name as requested by the caller (may be an alias)
    port: Option<String>,
    /// Device path actually handed to the vendor SDK
    target: Option<String>,
    params: OpenParams,
    phase: SessionPhase,
    poll: Option<ScheduledPoll>,
    /// Bumped on every arm and cancel; ticks carrying an older value are stale
    generation: u64,
}

impl ClassSession {
    pub fn new(class: SensorClass) -> Self {
        Self {
            class,
            port: None,
            target: None,
            params: OpenParams::default(),
            phase: SessionPhase::Closed,
            poll: None,
            generation: 0,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
    }

    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn params(&self) -> OpenParams {
        self.params
    }

    /// Record what the caller asked to open
    pub fn bind(&mut self, port: &str, target: &str, params: OpenParams) {
        self.port = Some(port.to_string());
        self.target = Some(target.to_string());
        self.params = params;
    }

    /// Whether this session is bound to `device` by port name or resolved path
    pub fn is_bound_to(&self, device: &UsbDevice) -> bool {
        self.port.as_deref() == Some(device.name.as_str())
            || self.target.as_deref() == Some(device.name.as_str())
    }

    pub fn poll_scheduled(&self) -> bool {
        self.poll.is_some()
    }

    /// Arm the next poll, replacing any pending one
    pub fn arm_poll(&mut self, delay: Duration, events: mpsc::Sender<SessionEvent>) {
        self.generation += 1;
        self.poll = Some(ScheduledPoll::schedule(
            self.class,
            self.generation,
            delay,
            events,
        ));
    }

    /// Cancel the pending poll, if any
    pub fn cancel_poll(&mut self) {
        self.generation += 1;
        if let Some(poll) = self.poll.take() {
            poll.cancel();
        }
    }

    /// Consume a tick. Returns `false` if it is stale.
    pub fn take_tick(&mut self, generation: u64) -> bool {
        match &self.poll {
            Some(poll) if poll.generation() == generation => {
                self.poll = None;
                true
            }
            _ => false,
        }
    }

    /// Back to `Closed`, dropping the binding and any pending poll
    pub fn reset(&mut self) {
        self.cancel_poll();
        self.port = None;
        self.target = None;
        self.params = OpenParams::default();
        self.phase = SessionPhase::Closed;
    }

    pub fn snapshot(&self) -> SessionInfo {
        SessionInfo {
            class: self.class,
            phase: self.phase,
            port: self.port.clone(),
            level: match self.class {
                SensorClass::Presence if self.port.is_some() => Some(self.params.level),
                _ => None,
            },
            poll_scheduled: self.poll_scheduled(),
        }
    }
}
