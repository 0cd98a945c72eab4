//! Output formatting utilities for the CLI
//!
//! Provides table and JSON formatting with colors.

use anyhow::Result;
use colored::*;
use kiosk_core::api::{InfoResponse, PortsResponse, SessionInfo, VendorCodeResponse};
use kiosk_core::{LightStatus, Notification, SessionPhase};
use serde::Serialize;

use tabled::{settings::Style, Table, Tabled};

/// Output format options
#[derive(Debug, Clone)]
pub enum OutputFormat {
    Table,
    Json,
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn colored_phase(phase: SessionPhase) -> String {
    let text = phase.as_str();
    match phase {
        SessionPhase::Closed => text.dimmed().to_string(),
        SessionPhase::PermissionPending => text.yellow().to_string(),
        SessionPhase::Open => text.cyan().to_string(),
        SessionPhase::Polling => text.green().to_string(),
    }
}

fn sessions_table(sessions: &[SessionInfo]) -> String {
    #[derive(Tabled)]
    struct SessionRow {
        #[tabled(rename = "Class")]
        class: String,
        #[tabled(rename = "Phase")]
        phase: String,
        #[tabled(rename = "Port")]
        port: String,
        #[tabled(rename = "Level")]
        level: String,
        #[tabled(rename = "Polling")]
        polling: String,
    }

    let rows = sessions.iter().map(|session| SessionRow {
        class: session.class.to_string(),
        phase: colored_phase(session.phase),
        port: session.port.clone().unwrap_or_else(|| "-".to_string()),
        level: session
            .level
            .map(|level| level.to_string())
            .unwrap_or_else(|| "-".to_string()),
        polling: if session.poll_scheduled {
            "yes".green().to_string()
        } else {
            "no".dimmed().to_string()
        },
    });

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format info response
pub fn format_info(info: &InfoResponse, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(info),
        OutputFormat::Table => {
            let mut output = String::new();
            output.push_str(&"Kiosk Sensor Bridge".bold().to_string());
            output.push('\n');
            output.push_str(&format!("Version: {}", info.version.cyan()));
            output.push('\n');
            output.push_str(&format!(
                "Mode: {}",
                if info.mock_mode {
                    "mock".yellow()
                } else {
                    "hardware".green()
                }
            ));
            output.push('\n');
            output.push_str(&format!(
                "Uptime: {} seconds",
                info.uptime.to_string().yellow()
            ));
            output.push('\n');
            output.push_str(&format!(
                "Devices: {}",
                info.device_count.to_string().cyan()
            ));
            output.push('\n');
            output.push_str(&sessions_table(&info.sessions));
            Ok(output)
        }
    }
}

/// Format a port listing
pub fn format_ports(ports: &PortsResponse, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(ports),
        OutputFormat::Table => {
            let title = format!("{} ports:", ports.class).bold().to_string();
            if ports.ports.is_empty() {
                return Ok(format!("{}\n{}", title, "(none)".dimmed()));
            }

            #[derive(Tabled)]
            struct PortRow {
                #[tabled(rename = "#")]
                index: usize,
                #[tabled(rename = "Port")]
                port: String,
            }

            let rows = ports.ports.iter().enumerate().map(|(index, port)| PortRow {
                index,
                port: port.cyan().to_string(),
            });
            let table = Table::new(rows).with(Style::rounded()).to_string();
            Ok(format!("{}\n{}", title, table))
        }
    }
}

/// Format one session snapshot
pub fn format_session(session: &SessionInfo, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(session),
        OutputFormat::Table => Ok(sessions_table(std::slice::from_ref(session))),
    }
}

/// Format the session listing
pub fn format_sessions(sessions: &[SessionInfo], format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(sessions),
        OutputFormat::Table => Ok(format!(
            "{}\n{}",
            "Sessions:".bold(),
            sessions_table(sessions)
        )),
    }
}

/// Format a pass-through result; a nonzero vendor code is shown as a failure
pub fn format_vendor_code(
    command: &str,
    result: &VendorCodeResponse,
    format: &OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(result),
        OutputFormat::Table => {
            if result.code == 0 {
                Ok(format_success(&format!("{} on {}", command, result.port)))
            } else {
                Ok(format!(
                    "{} {} on {} returned vendor code {}",
                    "✗".red().bold(),
                    command,
                    result.port,
                    result.code.to_string().red()
                ))
            }
        }
    }
}

/// Format a decoded light status
pub fn format_light_status(port: &str, status: &LightStatus, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(status),
        OutputFormat::Table => Ok(format!(
            "{} {}\nRed: {}  Green: {}  Blue: {}  Mode: {}",
            "Light status:".bold(),
            port.cyan(),
            status.red.to_string().red(),
            status.green.to_string().green(),
            status.blue.to_string().blue(),
            status.mode.to_string().yellow()
        )),
    }
}

/// Format one notification as a single line
pub fn format_notification(notification: &Notification, format: &OutputFormat) -> Result<String> {
    if let OutputFormat::Json = format {
        return Ok(serde_json::to_string(notification)?);
    }

    let name = notification.name().bold();
    let line = match notification {
        Notification::PortsUpdated { class, ports } => {
            format!("{} {} [{}]", name, class, ports.join(", "))
        }
        Notification::DeviceAttached => name.to_string(),
        Notification::DeviceDetached { class, device } => match class {
            Some(class) => format!("{} {} {}", name, class, device),
            None => format!("{} {}", name, device),
        },
        Notification::PermissionGranted { device } => {
            format!("{} {}", name.green(), device)
        }
        Notification::PermissionDenied { device, .. } => format!("{} {}", name.red(), device),
        Notification::SensorStarted { class, port } => {
            format!("{} {} {}", name.green(), class, port.cyan())
        }
        Notification::SensorStopped { class } => format!("{} {}", name, class),
        Notification::SensorError { class, error } => {
            format!("{} {} {}: {}", name.red(), class, error.code, error.message)
        }
        Notification::SensorUpdate { class, reading } => format!(
            "{} {} value={} status={}",
            name,
            class,
            reading.value.to_string().cyan(),
            reading.status.as_str().yellow()
        ),
    };
    Ok(line)
}

/// Format success message
pub fn format_success(message: &str) -> String {
    format!("{} {}", "✓".green().bold(), message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_core::{SensorClass, SensorReading, SensorStatus};

    fn presence_session() -> SessionInfo {
        SessionInfo {
            class: SensorClass::Presence,
            phase: SessionPhase::Polling,
            port: Some("/dev/ttyUSB0".to_string()),
            level: Some(1),
            poll_scheduled: true,
        }
    }

    #[test]
    fn test_format_success() {
        let message = format_success("Operation completed");
        assert!(message.contains("✓"));
        assert!(message.contains("Operation completed"));
    }

    #[test]
    fn test_format_info_json() {
        let info = InfoResponse {
            version: "1.0.0".to_string(),
            mock_mode: true,
            uptime: 3600,
            device_count: 2,
            sessions: vec![presence_session()],
        };

        let result = format_info(&info, &OutputFormat::Json).unwrap();
        assert!(result.contains("\"mock_mode\": true"));
        assert!(result.contains("polling"));
    }

    #[test]
    fn test_format_info_table_lists_sessions() {
        let info = InfoResponse {
            version: "1.0.0".to_string(),
            mock_mode: false,
            uptime: 5,
            device_count: 2,
            sessions: vec![presence_session()],
        };

        let result = format_info(&info, &OutputFormat::Table).unwrap();
        assert!(result.contains("/dev/ttyUSB0"));
        assert!(result.contains("presence"));
    }

    #[test]
    fn test_format_empty_ports() {
        let ports = PortsResponse {
            class: SensorClass::Light,
            ports: vec![],
        };
        let result = format_ports(&ports, &OutputFormat::Table).unwrap();
        assert!(result.contains("(none)"));
    }

    #[test]
    fn test_format_vendor_code_failure() {
        let result = VendorCodeResponse {
            port: "SerialCOM1".to_string(),
            code: -5,
        };
        let output = format_vendor_code("flash", &result, &OutputFormat::Table).unwrap();
        assert!(output.contains("-5"));
        assert!(!output.contains("✓"));
    }

    #[test]
    fn test_format_notification() {
        let update = Notification::SensorUpdate {
            class: SensorClass::Presence,
            reading: SensorReading {
                value: 16,
                status: SensorStatus::Far,
            },
        };

        let line = format_notification(&update, &OutputFormat::Table).unwrap();
        assert!(line.contains("16"));
        assert!(line.contains("FAR"));

        let json = format_notification(&update, &OutputFormat::Json).unwrap();
        assert!(!json.contains('\n'));
        assert!(json.contains("\"event\":\"sensor_update\""));
    }
}
