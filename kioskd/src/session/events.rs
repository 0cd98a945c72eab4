//! Messages processed by the session manager task

use kiosk_core::api::SessionInfo;
use kiosk_core::{LedColor, LightStatus, OpenParams, Result, SensorClass, SessionPhase, UsbDevice};
use tokio::sync::oneshot;

/// Reply channel carried by every request
pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

/// Caller-initiated operations
#[derive(Debug)]
pub(crate) enum Request {
    ListPorts {
        class: SensorClass,
        reply: Reply<Vec<String>>,
    },
    RefreshPorts {
        class: SensorClass,
        reply: Reply<Vec<String>>,
    },
    Start {
        class: SensorClass,
        port: String,
        params: OpenParams,
        reply: Reply<SessionPhase>,
    },
    Stop {
        class: SensorClass,
        reply: Reply<()>,
    },
    Sessions {
        reply: Reply<Vec<SessionInfo>>,
    },
    DeviceCount {
        reply: Reply<usize>,
    },
    RequestPermission {
        port: String,
        reply: Reply<bool>,
    },
    DetectPorts {
        reply: Reply<usize>,
    },
    ComList {
        reply: Reply<Vec<String>>,
    },
    Port {
        port: String,
        command: PortCommand,
    },
}

/// Pass-through vendor calls addressed to a single port
#[derive(Debug)]
pub(crate) enum PortCommand {
    IsOpen(Reply<bool>),
    Open { baud_rate: u32, reply: Reply<i32> },
    Close(Reply<i32>),
    SetColor { color: LedColor, reply: Reply<i32> },
    ShowColor { color: LedColor, reply: Reply<i32> },
    Flash(Reply<i32>),
    Smooth(Reply<i32>),
    Stop(Reply<i32>),
    Breathe { pattern: u32, reply: Reply<i32> },
    RawStatus(Reply<Vec<u8>>),
    ParsedStatus(Reply<LightStatus>),
    Firmware(Reply<String>),
}

/// Everything the session manager reacts to
#[derive(Debug)]
pub(crate) enum SessionEvent {
    Request(Request),
    /// A device appeared in the registry
    Attached(UsbDevice),
    /// A device disappeared from the registry
    Detached(UsbDevice),
    /// Answer to an access request
    PermissionResult { device: UsbDevice, granted: bool },
    /// Scheduled poll fired
    PollTick { class: SensorClass, generation: u64 },
    /// Close both sessions, release subscriptions and stop
    Shutdown(oneshot::Sender<()>),
}
