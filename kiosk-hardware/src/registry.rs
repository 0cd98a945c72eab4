//! USB device registry
//!
//! Enumerates attached USB serial devices and tracks which ones the process
//! has been granted access to.

use kiosk_core::{AdapterFamily, KioskError, Result, UsbDevice};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error};

/// Live view of attached USB devices
pub trait UsbRegistry: Send + Sync {
    /// Snapshot of the attached devices
    fn devices(&self) -> Result<Vec<UsbDevice>>;

    /// Whether the process may open `device`
    fn has_permission(&self, device: &UsbDevice) -> bool;

    /// Record an access grant for `device`
    fn grant(&self, device: &UsbDevice);

    /// Drop any grant held for `device`
    fn revoke(&self, device: &UsbDevice);
}

/// Whether a device node can be opened for reading and writing
pub fn check_access(path: &str) -> bool {
    std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .is_ok()
}

/// Members of the adapter family, sorted by device name
///
/// The position in this list is the alias index (`SerialCOM1` is index 0).
pub fn adapter_ports(devices: &[UsbDevice], family: &AdapterFamily) -> Vec<UsbDevice> {
    let mut ports: Vec<UsbDevice> = devices
        .iter()
        .filter(|d| family.contains(d))
        .cloned()
        .collect();
    ports.sort_by(|a, b| a.name.cmp(&b.name));
    ports
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry backed by the operating system's serial port enumeration
#[derive(Debug, Default)]
pub struct SerialPortRegistry {
    granted: Mutex<HashSet<String>>,
}

impl SerialPortRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsbRegistry for SerialPortRegistry {
    fn devices(&self) -> Result<Vec<UsbDevice>> {
        let ports = tokio_serial::available_ports().map_err(|e| {
            error!("Failed to enumerate serial ports: {}", e);
            KioskError::Serial(format!("Failed to enumerate ports: {}", e))
        })?;

        let devices = ports
            .into_iter()
            .filter_map(|port| match port.port_type {
                tokio_serial::SerialPortType::UsbPort(info) => Some(UsbDevice {
                    name: port.port_name,
                    vendor_id: info.vid,
                    product_id: info.pid,
                    serial_number: info.serial_number,
                    manufacturer: info.manufacturer,
                    product: info.product,
                }),
                _ => {
                    debug!("Skipping non-USB port {}", port.port_name);
                    None
                }
            })
            .collect();

        Ok(devices)
    }

    fn has_permission(&self, device: &UsbDevice) -> bool {
        lock(&self.granted).contains(&device.name) || check_access(&device.name)
    }

    fn grant(&self, device: &UsbDevice) {
        lock(&self.granted).insert(device.name.clone());
    }

    fn revoke(&self, device: &UsbDevice) {
        lock(&self.granted).remove(&device.name);
    }
}

#[derive(Debug, Default)]
struct MockRegistryState {
    devices: Vec<UsbDevice>,
    granted: HashSet<String>,
}

/// In-memory registry for tests and mock mode
///
/// Cloned handles share one device list.
#[derive(Debug, Clone, Default)]
pub struct MockRegistry {
    state: Arc<Mutex<MockRegistryState>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with `devices`
    pub fn with_devices(devices: Vec<UsbDevice>) -> Self {
        let registry = Self::default();
        lock(&registry.state).devices = devices;
        registry
    }

    /// Plug a device in
    pub fn attach(&self, device: UsbDevice) {
        let mut state = lock(&self.state);
        state.devices.retain(|d| d.name != device.name);
        state.devices.push(device);
    }

    /// Unplug a device by name
    pub fn detach(&self, name: &str) -> Option<UsbDevice> {
        let mut state = lock(&self.state);
        let pos = state.devices.iter().position(|d| d.name == name)?;
        Some(state.devices.remove(pos))
    }
}

impl UsbRegistry for MockRegistry {
    fn devices(&self) -> Result<Vec<UsbDevice>> {
        Ok(lock(&self.state).devices.clone())
    }

    fn has_permission(&self, device: &UsbDevice) -> bool {
        lock(&self.state).granted.contains(&device.name)
    }

    fn grant(&self, device: &UsbDevice) {
        lock(&self.state).granted.insert(device.name.clone());
    }

    fn revoke(&self, device: &UsbDevice) {
        lock(&self.state).granted.remove(&device.name);
    }
}
