//! Configuration types for the sensor bridge
//!
//! All configuration is static: it is loaded once by the daemon at startup
//! from a TOML file. Runtime state (device lists, sessions) is never
//! persisted and is rebuilt from the live registry.

mod paths;
mod static_config;

pub use paths::default_config_path;
pub use static_config::{
    ClassConfig, CompatConfig, HotplugConfig, PermissionConfig, PermissionPolicy,
    PollingConfig, ServerConfig, StaticConfig,
};
