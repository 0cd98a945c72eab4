//! Static configuration loaded once at startup
//!
//! This configuration is read-only after the daemon starts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::device::{AdapterFamily, DeviceFilter};
use crate::error::{KioskError, Result};
use crate::types::SensorClass;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server hostname
    pub hostname: String,
    /// Server port
    pub port: u16,
    /// Vendor call timeout in milliseconds
    #[serde(default = "default_vendor_timeout_ms")]
    pub vendor_timeout_ms: u64,
}

fn default_vendor_timeout_ms() -> u64 {
    1000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: 3080,
            vendor_timeout_ms: default_vendor_timeout_ms(),
        }
    }
}

/// Poll loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between a successful open and the first poll
    pub initial_delay_ms: u64,
    /// Delay between the end of one poll and the start of the next
    pub period_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2000,
            period_ms: 1000,
        }
    }
}

impl PollingConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Per-class device matching and port settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassConfig {
    /// `VID:PID` patterns selecting devices of this class
    pub filters: Vec<DeviceFilter>,
    /// Only list devices of this vendor (filtered list is still used for lookups)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_vendor_id: Option<u16>,
    /// Hide multi-port adapter devices from the listing (their aliases are listed instead)
    #[serde(default)]
    pub hide_adapter_devices: bool,
    /// Port name prefixes that can be opened without an access grant
    #[serde(default)]
    pub permission_exempt_prefixes: Vec<String>,
    /// Baud rate handed to the vendor open call
    pub baud_rate: u32,
}

impl ClassConfig {
    /// Defaults for the presence sensor class
    pub fn presence() -> Self {
        Self {
            filters: vec![DeviceFilter::exact(0x0F10, 0x0100), DeviceFilter::vendor(0x9710)],
            list_vendor_id: None,
            hide_adapter_devices: true,
            permission_exempt_prefixes: vec!["/dev/ttyACM".to_string()],
            baud_rate: 115200,
        }
    }

    /// Defaults for the light class
    pub fn light() -> Self {
        Self {
            filters: vec![DeviceFilter::exact(0x0F10, 0x0200)],
            list_vendor_id: Some(0x0F10),
            hide_adapter_devices: false,
            permission_exempt_prefixes: Vec::new(),
            baud_rate: 115200,
        }
    }

    /// Whether a port name can be opened without asking for permission
    pub fn is_permission_exempt(&self, port: &str) -> bool {
        self.permission_exempt_prefixes
            .iter()
            .any(|prefix| port.starts_with(prefix.as_str()))
    }
}

/// Hotplug watcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotplugConfig {
    /// Watch the registry for attach/detach events
    pub enabled: bool,
    /// Interval between registry scans in milliseconds
    pub scan_interval_ms: u64,
}

impl Default for HotplugConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_ms: 500,
        }
    }
}

impl HotplugConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }
}

/// How access requests are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionPolicy {
    /// Grant every request
    AutoGrant,
    /// Decline every request
    Deny,
    /// Grant only if the device node can be opened read/write
    CheckAccess,
}

/// Permission broker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionConfig {
    pub policy: PermissionPolicy,
    /// Delay before a request is answered in milliseconds
    #[serde(default)]
    pub response_delay_ms: u64,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            policy: PermissionPolicy::CheckAccess,
            response_delay_ms: 0,
        }
    }
}

/// Switches reproducing legacy behaviour
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompatConfig {
    /// Do not record a pending permission token when a light session waits
    /// for access. A later grant then does not resume the open.
    #[serde(default)]
    pub light_skip_pending_token: bool,
}

/// Static configuration for the sensor bridge daemon.
///
/// Located at `~/.config/kiosk-sensors/config.toml` by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticConfig {
    /// Server configuration (hostname, port, timeout)
    #[serde(default)]
    pub server: ServerConfig,

    /// Poll loop timing
    #[serde(default)]
    pub polling: PollingConfig,

    /// Presence sensor (class A) settings
    #[serde(default = "ClassConfig::presence")]
    pub presence: ClassConfig,

    /// Light (class B) settings
    #[serde(default = "ClassConfig::light")]
    pub light: ClassConfig,

    /// Multi-port adapter family exposed as legacy aliases
    #[serde(default)]
    pub adapter: AdapterFamily,

    /// Hotplug watcher settings
    #[serde(default)]
    pub hotplug: HotplugConfig,

    /// Permission broker settings
    #[serde(default)]
    pub permission: PermissionConfig,

    /// Legacy behaviour switches
    #[serde(default)]
    pub compat: CompatConfig,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            polling: PollingConfig::default(),
            presence: ClassConfig::presence(),
            light: ClassConfig::light(),
            adapter: AdapterFamily::default(),
            hotplug: HotplugConfig::default(),
            permission: PermissionConfig::default(),
            compat: CompatConfig::default(),
        }
    }
}

impl StaticConfig {
    /// Parse StaticConfig from TOML string.
    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize StaticConfig to TOML string.
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Settings for one sensor class
    pub fn class(&self, class: SensorClass) -> &ClassConfig {
        match class {
            SensorClass::Presence => &self.presence,
            SensorClass::Light => &self.light,
        }
    }

    /// Reject values the session manager cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.polling.period_ms == 0 {
            return Err(KioskError::Config(
                "polling.period_ms must be greater than zero".to_string(),
            ));
        }

        if self.hotplug.enabled && self.hotplug.scan_interval_ms == 0 {
            return Err(KioskError::Config(
                "hotplug.scan_interval_ms must be greater than zero".to_string(),
            ));
        }

        for class in SensorClass::ALL {
            let cfg = self.class(class);
            if cfg.filters.is_empty() {
                return Err(KioskError::Config(format!(
                    "{}.filters must contain at least one VID:PID pattern",
                    class
                )));
            }
            if cfg.baud_rate == 0 {
                return Err(KioskError::Config(format!(
                    "{}.baud_rate must be greater than zero",
                    class
                )));
            }
        }

        if self.adapter.alias_prefix.is_empty() {
            return Err(KioskError::Config(
                "adapter.alias_prefix cannot be empty".to_string(),
            ));
        }

        if self.adapter.product_id_min > self.adapter.product_id_max {
            return Err(KioskError::Config(format!(
                "adapter product range is empty (0x{:04x} > 0x{:04x})",
                self.adapter.product_id_min, self.adapter.product_id_max
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_static_config() {
        let config = StaticConfig::default();
        assert_eq!(config.server.port, 3080);
        assert_eq!(config.polling.initial_delay(), Duration::from_secs(2));
        assert_eq!(config.polling.period(), Duration::from_secs(1));
        assert_eq!(config.presence.baud_rate, 115200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_static_config_serialization() {
        let config = StaticConfig::default();
        let toml_str = config.to_toml().unwrap();

        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[polling]"));
        assert!(toml_str.contains("[presence]"));
        assert!(toml_str.contains("0x0f10:0x0100"));

        let back = StaticConfig::from_toml(&toml_str).unwrap();
        assert_eq!(back.light.list_vendor_id, Some(0x0F10));
    }

    #[test]
    fn test_static_config_partial_deserialization() {
        let toml_str = r#"
            [server]
            hostname = "0.0.0.0"
            port = 8080

            [polling]
            initial_delay_ms = 500
            period_ms = 250

            [light]
            filters = ["0x0f10:*"]
            list_vendor_id = 0x0F10
            baud_rate = 9600

            [permission]
            policy = "auto_grant"
        "#;

        let config = StaticConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.server.hostname, "0.0.0.0");
        assert_eq!(config.server.vendor_timeout_ms, 1000);
        assert_eq!(config.polling.period_ms, 250);
        assert_eq!(config.light.baud_rate, 9600);
        assert_eq!(config.light.filters, vec![DeviceFilter::vendor(0x0F10)]);
        assert_eq!(config.permission.policy, PermissionPolicy::AutoGrant);
        // Untouched sections fall back to defaults
        assert_eq!(config.presence.permission_exempt_prefixes, vec!["/dev/ttyACM"]);
        assert_eq!(config.adapter.alias_prefix, "SerialCOM");
        assert!(!config.compat.light_skip_pending_token);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = StaticConfig::from_toml("").unwrap();
        assert_eq!(config.server.port, 3080);
        assert!(config.hotplug.enabled);
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let toml_str = r#"
            [presence]
            filters = ["not-a-filter"]
            baud_rate = 115200
        "#;
        assert!(StaticConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_period() {
        let mut config = StaticConfig::default();
        config.polling.period_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_filters() {
        let mut config = StaticConfig::default();
        config.light.filters.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("light.filters"));
    }

    #[test]
    fn test_permission_exempt() {
        let presence = ClassConfig::presence();
        assert!(presence.is_permission_exempt("/dev/ttyACM0"));
        assert!(!presence.is_permission_exempt("/dev/ttyUSB0"));
        assert!(!ClassConfig::light().is_permission_exempt("/dev/ttyACM0"));
    }
}
