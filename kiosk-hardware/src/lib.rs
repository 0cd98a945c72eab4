//! kiosk-hardware
//!
//! Hardware abstraction crate: the serial driver and command protocol spoken by
//! presence sensors and status lights, the vendor SDK surface built on top of
//! them, and the USB device registry.
//!
//! Public API:
//! - `sdk::VendorSdk`: port-addressed vendor calls
//! - `sdk::SerialSdk`: vendor SDK over real serial ports
//! - `mock::MockSdk`: simulated SDK for tests and `--mock` mode
//! - `registry::UsbRegistry`: attached devices and access grants

pub mod mock;
pub mod registry;
pub mod sdk;
pub mod sensor_port;
pub mod serial_driver;

pub use mock::{MockCall, MockSdk};
pub use registry::{adapter_ports, check_access, MockRegistry, SerialPortRegistry, UsbRegistry};
pub use sdk::{codes, vendor_code_for, SerialSdk, VendorSdk};
pub use sensor_port::SensorPort;
pub use serial_driver::{SerialDriver, SerialTransport};
