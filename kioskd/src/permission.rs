//! Permission broker
//!
//! Answers access requests asynchronously according to the configured policy.
//! The answer is posted back to the session manager as a `PermissionResult`.

use kiosk_core::{PermissionPolicy, UsbDevice};
use kiosk_hardware::check_access;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::session::SessionEvent;

/// Issues access requests; outstanding requests are abandoned on drop
#[derive(Debug)]
pub(crate) struct PermissionBroker {
    policy: PermissionPolicy,
    response_delay: Duration,
    events: mpsc::Sender<SessionEvent>,
    inflight: Vec<JoinHandle<()>>,
}

impl PermissionBroker {
    pub fn new(
        policy: PermissionPolicy,
        response_delay: Duration,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            policy,
            response_delay,
            events,
            inflight: Vec::new(),
        }
    }

    /// Ask for access to `device`; the result arrives later as an event
    pub fn request(&mut self, device: UsbDevice) {
        info!("Requesting access to {} ({:?})", device, self.policy);

        self.inflight.retain(|handle| !handle.is_finished());

        let policy = self.policy;
        let delay = self.response_delay;
        let events = self.events.clone();

        self.inflight.push(tokio::spawn(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }

            let granted = match policy {
                PermissionPolicy::AutoGrant => true,
                PermissionPolicy::Deny => false,
                PermissionPolicy::CheckAccess => check_access(&device.name),
            };
            debug!("Access to {} granted: {}", device.name, granted);

            let _ = events
                .send(SessionEvent::PermissionResult { device, granted })
                .await;
        }));
    }
}

impl Drop for PermissionBroker {
    fn drop(&mut self) {
        for handle in &self.inflight {
            handle.abort();
        }
    }
}
