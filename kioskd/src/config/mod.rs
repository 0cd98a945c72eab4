//! Configuration loading for the daemon
//!
//! Reads the static TOML configuration, writing defaults when the file is
//! missing, and checks it before the session manager starts.

use kiosk_core::{DeviceFilter, KioskError, Result, SensorClass, StaticConfig};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

/// Configuration problems that do not stop the daemon
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// A device can match both classes; it is classified as a presence sensor
    #[error("Presence filter {presence} overlaps light filter {light}; matching devices are treated as presence sensors")]
    OverlappingFilters {
        presence: DeviceFilter,
        light: DeviceFilter,
    },
    /// Alias names start with an exempt prefix and would skip the access check
    #[error("{class} exempt prefix '{prefix}' also matches adapter aliases ('{alias_prefix}N')")]
    ExemptPrefixCoversAliases {
        class: SensorClass,
        prefix: String,
        alias_prefix: String,
    },
}

fn part_overlaps(a: Option<u16>, b: Option<u16>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

fn filters_overlap(a: &DeviceFilter, b: &DeviceFilter) -> bool {
    part_overlaps(a.vendor_id, b.vendor_id) && part_overlaps(a.product_id, b.product_id)
}

/// Load the static config from TOML, creating it with defaults if missing.
///
/// The loaded config is validated; hard errors are returned as
/// [`KioskError::Config`] and soft problems are logged.
pub(crate) async fn load_static_config(path: &Path) -> Result<StaticConfig> {
    let config = if !path.exists() {
        info!(
            "Static config not found at {}. Creating with defaults.",
            path.display()
        );

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                KioskError::Config(format!(
                    "Failed to create config directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let config = StaticConfig::default();
        let toml_str = config
            .to_toml()
            .map_err(|e| KioskError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, &toml_str)
            .await
            .map_err(|e| KioskError::Config(format!("Failed to write config file: {}", e)))?;

        config
    } else {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| KioskError::Config(format!("Failed to read config file: {}", e)))?;

        StaticConfig::from_toml(&content)
            .map_err(|e| KioskError::Config(format!("Failed to parse config file: {}", e)))?
    };

    config.validate()?;
    for warning in check_consistency(&config) {
        warn!("Configuration: {}", warning);
    }
    debug_config(&config);

    Ok(config)
}

/// Cross-section checks the per-field validation cannot see
pub(crate) fn check_consistency(config: &StaticConfig) -> Vec<ValidationError> {
    let mut warnings = Vec::new();

    for presence in &config.presence.filters {
        for light in &config.light.filters {
            if filters_overlap(presence, light) {
                warnings.push(ValidationError::OverlappingFilters {
                    presence: *presence,
                    light: *light,
                });
            }
        }
    }

    let alias_prefix = &config.adapter.alias_prefix;
    for class in SensorClass::ALL {
        for prefix in &config.class(class).permission_exempt_prefixes {
            if alias_prefix.starts_with(prefix.as_str()) {
                warnings.push(ValidationError::ExemptPrefixCoversAliases {
                    class,
                    prefix: prefix.clone(),
                    alias_prefix: alias_prefix.clone(),
                });
            }
        }
    }

    warnings
}

fn debug_config(config: &StaticConfig) {
    debug!("--- Server Config ---");
    debug!("  Host: {}", config.server.hostname);
    debug!("  Port: {}", config.server.port);
    debug!("  Vendor timeout: {}ms", config.server.vendor_timeout_ms);
    debug!("--- Polling ---");
    debug!(
        "  Initial delay: {}ms, period: {}ms",
        config.polling.initial_delay_ms, config.polling.period_ms
    );
    for class in SensorClass::ALL {
        let cfg = config.class(class);
        let filters: Vec<String> = cfg.filters.iter().map(|f| f.to_string()).collect();
        debug!("--- {} ---", class);
        debug!("  Filters: {}", filters.join(", "));
        debug!("  Baud rate: {}", cfg.baud_rate);
    }
    debug!(
        "--- Adapter: 0x{:04x}:0x{:04x}-0x{:04x} as {}N ---",
        config.adapter.vendor_id,
        config.adapter.product_id_min,
        config.adapter.product_id_max,
        config.adapter.alias_prefix
    );
    debug!("--- Permission policy: {:?} ---", config.permission.policy);
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_core::PermissionPolicy;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_creates_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let config = load_static_config(&config_path).await.unwrap();

        assert!(config_path.exists());
        assert_eq!(config.server.port, 3080);
        assert_eq!(config.polling.initial_delay_ms, 2000);

        // The written file loads back to the same values
        let again = load_static_config(&config_path).await.unwrap();
        assert_eq!(again.presence.baud_rate, config.presence.baud_rate);
        assert_eq!(again.adapter, config.adapter);
    }

    #[tokio::test]
    async fn test_load_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[server]
hostname = "0.0.0.0"
port = 4000

[permission]
policy = "auto_grant"
"#,
        )
        .await
        .unwrap();

        let config = load_static_config(&config_path).await.unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.permission.policy, PermissionPolicy::AutoGrant);
        assert_eq!(config.polling.period_ms, 1000);
        assert_eq!(config.adapter.alias_prefix, "SerialCOM");
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_values() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            "[polling]\ninitial_delay_ms = 2000\nperiod_ms = 0\n",
        )
        .await
        .unwrap();

        let err = load_static_config(&config_path).await.unwrap_err();
        assert!(matches!(err, KioskError::Config(_)));
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[server\nport = ").await.unwrap();

        let err = load_static_config(&config_path).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_defaults_are_consistent() {
        assert!(check_consistency(&StaticConfig::default()).is_empty());
    }

    #[test]
    fn test_overlapping_filters_reported() {
        let mut config = StaticConfig::default();
        config.light.filters.push(DeviceFilter::vendor(0x9710));

        let warnings = check_consistency(&config);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            warnings[0],
            ValidationError::OverlappingFilters { .. }
        ));
    }

    #[test]
    fn test_exempt_prefix_covering_aliases() {
        let mut config = StaticConfig::default();
        config
            .light
            .permission_exempt_prefixes
            .push("Serial".to_string());

        let warnings = check_consistency(&config);
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].to_string(),
            "light exempt prefix 'Serial' also matches adapter aliases ('SerialCOMN')"
        );
    }
}
