//! Hotplug watcher
//!
//! Polls the USB registry and turns differences between successive snapshots
//! into attach/detach events for the session manager.

use kiosk_core::UsbDevice;
use kiosk_hardware::UsbRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::session::SessionEvent;

type Snapshot = BTreeMap<String, UsbDevice>;

/// Devices added and removed between two snapshots
pub(crate) fn diff(previous: &Snapshot, current: &Snapshot) -> (Vec<UsbDevice>, Vec<UsbDevice>) {
    let added = current
        .iter()
        .filter(|(name, _)| !previous.contains_key(*name))
        .map(|(_, device)| device.clone())
        .collect();
    let removed = previous
        .iter()
        .filter(|(name, _)| !current.contains_key(*name))
        .map(|(_, device)| device.clone())
        .collect();
    (added, removed)
}

fn snapshot(devices: Vec<UsbDevice>) -> Snapshot {
    devices.into_iter().map(|d| (d.name.clone(), d)).collect()
}

/// Background registry watcher; stops when dropped
#[derive(Debug)]
pub(crate) struct HotplugWatcher {
    handle: JoinHandle<()>,
}

impl HotplugWatcher {
    pub fn start(
        registry: Arc<dyn UsbRegistry>,
        scan_interval: Duration,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        info!(
            "Starting hotplug watcher with {}ms interval",
            scan_interval.as_millis()
        );

        let handle = tokio::spawn(async move {
            let mut known = match registry.devices() {
                Ok(devices) => snapshot(devices),
                Err(e) => {
                    warn!("Initial device scan failed: {}", e);
                    Snapshot::new()
                }
            };

            let mut ticker = interval(scan_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let current = match registry.devices() {
                    Ok(devices) => snapshot(devices),
                    Err(e) => {
                        warn!("Device scan failed: {}", e);
                        continue;
                    }
                };

                let (added, removed) = diff(&known, &current);
                known = current;

                for device in removed {
                    debug!("Detached: {}", device);
                    if events.send(SessionEvent::Detached(device)).await.is_err() {
                        return;
                    }
                }
                for device in added {
                    debug!("Attached: {}", device);
                    if events.send(SessionEvent::Attached(device)).await.is_err() {
                        return;
                    }
                }
            }
        });

        Self { handle }
    }
}

impl Drop for HotplugWatcher {
    fn drop(&mut self) {
        debug!("Stopping hotplug watcher");
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_hardware::MockRegistry;

    fn dev(name: &str) -> UsbDevice {
        UsbDevice::new(name, 0x0F10, 0x0100)
    }

    #[test]
    fn test_diff() {
        let previous = snapshot(vec![dev("/dev/ttyUSB0"), dev("/dev/ttyUSB1")]);
        let current = snapshot(vec![dev("/dev/ttyUSB1"), dev("/dev/ttyUSB2")]);

        let (added, removed) = diff(&previous, &current);
        assert_eq!(added, vec![dev("/dev/ttyUSB2")]);
        assert_eq!(removed, vec![dev("/dev/ttyUSB0")]);
    }

    #[test]
    fn test_diff_unchanged() {
        let previous = snapshot(vec![dev("/dev/ttyUSB0")]);
        let (added, removed) = diff(&previous, &previous.clone());
        assert!(added.is_empty());
        assert!(removed.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_reports_changes() {
        let registry = MockRegistry::with_devices(vec![dev("/dev/ttyUSB0")]);
        let (tx, mut rx) = mpsc::channel(8);
        let _watcher =
            HotplugWatcher::start(Arc::new(registry.clone()), Duration::from_millis(500), tx);

        // Let the watcher take its initial snapshot
        tokio::time::sleep(Duration::from_millis(10)).await;

        registry.detach("/dev/ttyUSB0");
        registry.attach(dev("/dev/ttyUSB1"));

        match rx.recv().await {
            Some(SessionEvent::Detached(device)) => assert_eq!(device.name, "/dev/ttyUSB0"),
            other => panic!("unexpected event {:?}", other),
        }
        match rx.recv().await {
            Some(SessionEvent::Attached(device)) => assert_eq!(device.name, "/dev/ttyUSB1"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_watcher() {
        let registry = MockRegistry::new();
        let (tx, mut rx) = mpsc::channel(8);
        let watcher =
            HotplugWatcher::start(Arc::new(registry.clone()), Duration::from_millis(500), tx);
        drop(watcher);

        registry.attach(dev("/dev/ttyUSB0"));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.recv().await.is_none());
    }
}
