//! Command execution handlers

use anyhow::Result;
use kiosk_core::SensorClass;
use std::ops::ControlFlow;

use crate::client::KioskClient;
use crate::config::CliConfig;
use crate::format::{self, format_success};

use super::commands::*;

/// Handle info command
pub async fn handle_info(client: &KioskClient, format: &OutputFormat) -> Result<()> {
    let info = client.get_info().await?;
    println!("{}", format::format_info(&info, &format.into())?);
    Ok(())
}

/// Handle ports command
pub async fn handle_ports(
    client: &KioskClient,
    class: SensorClass,
    refresh: bool,
    format: &OutputFormat,
) -> Result<()> {
    let ports = if refresh {
        client.refresh_ports(class).await?
    } else {
        client.list_ports(class).await?
    };
    println!("{}", format::format_ports(&ports, &format.into())?);
    Ok(())
}

/// Handle start command
pub async fn handle_start(
    client: &KioskClient,
    class: SensorClass,
    port: &str,
    level: Option<i32>,
    format: &OutputFormat,
) -> Result<()> {
    let session = client.start_session(class, port, level).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        OutputFormat::Table => {
            if session.phase == kiosk_core::SessionPhase::PermissionPending {
                println!(
                    "Waiting for access to {}; the {} session opens once it is granted",
                    port, class
                );
            } else {
                println!("{}", format_success(&format!("Started {} on {}", class, port)));
            }
            println!("{}", format::format_session(&session, &format.into())?);
        }
    }

    Ok(())
}

/// Handle stop command
pub async fn handle_stop(
    client: &KioskClient,
    class: SensorClass,
    format: &OutputFormat,
) -> Result<()> {
    let session = client.stop_session(class).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        OutputFormat::Table => {
            println!("{}", format_success(&format!("Stopped {} session", class)));
        }
    }

    Ok(())
}

/// Handle sessions command
pub async fn handle_sessions(client: &KioskClient, format: &OutputFormat) -> Result<()> {
    let response = client.list_sessions().await?;
    println!(
        "{}",
        format::format_sessions(&response.sessions, &format.into())?
    );
    Ok(())
}

/// Handle permission command
pub async fn handle_permission(
    client: &KioskClient,
    port: &str,
    format: &OutputFormat,
) -> Result<()> {
    let response = client.request_permission(port).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Table => {
            if response.requested {
                println!("Access requested for {}", response.port);
            } else {
                println!(
                    "{}",
                    format_success(&format!("Access to {} already granted", response.port))
                );
            }
        }
    }

    Ok(())
}

/// Handle detect command
pub async fn handle_detect(client: &KioskClient, format: &OutputFormat) -> Result<()> {
    let response = client.detect_ports().await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Table => {
            println!(
                "{}",
                format_success(&format!("{} adapter ports detected", response.alias_count))
            );
        }
    }

    Ok(())
}

/// Handle light commands
pub async fn handle_light(
    client: &KioskClient,
    command: LightCommands,
    format: &OutputFormat,
) -> Result<()> {
    let out_format: format::OutputFormat = format.into();

    match command {
        LightCommands::ComList => {
            let response = client.com_list().await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
                OutputFormat::Table => {
                    if response.ports.is_empty() {
                        println!("No serial ports");
                    }
                    for port in &response.ports {
                        println!("{}", port);
                    }
                }
            }
        }
        LightCommands::IsOpen { port } => {
            let response = client.is_port_open(&port).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
                OutputFormat::Table => println!(
                    "{} is {}",
                    response.port,
                    if response.open { "open" } else { "closed" }
                ),
            }
        }
        LightCommands::Open { port, baud } => {
            let result = client.open_port(&port, baud).await?;
            println!("{}", format::format_vendor_code("open", &result, &out_format)?);
        }
        LightCommands::Close { port } => {
            let result = client.close_port(&port).await?;
            println!("{}", format::format_vendor_code("close", &result, &out_format)?);
        }
        LightCommands::Color { port, color } => {
            let result = client.set_color(&port, color.into()).await?;
            println!("{}", format::format_vendor_code("color", &result, &out_format)?);
        }
        LightCommands::Show { port, color } => {
            let result = client.show_color(&port, color.into()).await?;
            println!("{}", format::format_vendor_code("show", &result, &out_format)?);
        }
        LightCommands::Flash { port } => {
            let result = client.flash(&port).await?;
            println!("{}", format::format_vendor_code("flash", &result, &out_format)?);
        }
        LightCommands::Smooth { port } => {
            let result = client.smooth(&port).await?;
            println!("{}", format::format_vendor_code("smooth", &result, &out_format)?);
        }
        LightCommands::Stop { port } => {
            let result = client.stop_light(&port).await?;
            println!("{}", format::format_vendor_code("stop", &result, &out_format)?);
        }
        LightCommands::Breathe { port, pattern } => {
            let result = client.breathe(&port, pattern).await?;
            println!("{}", format::format_vendor_code("breathe", &result, &out_format)?);
        }
        LightCommands::Status { port, raw: true } => {
            let response = client.raw_status(&port).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
                OutputFormat::Table => {
                    let bytes: Vec<String> =
                        response.bytes.iter().map(|b| format!("{:02x}", b)).collect();
                    println!("{}: {}", response.port, bytes.join(" "));
                }
            }
        }
        LightCommands::Status { port, raw: false } => {
            let status = client.parsed_status(&port).await?;
            println!("{}", format::format_light_status(&port, &status, &out_format)?);
        }
        LightCommands::Firmware { port } => {
            let response = client.firmware_version(&port).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
                OutputFormat::Table => println!("{}: {}", response.port, response.version),
            }
        }
    }

    Ok(())
}

/// Handle events command
///
/// Prints one line per notification until `count` events were seen or the
/// daemon closes the stream.
pub async fn handle_events(
    client: &KioskClient,
    count: Option<usize>,
    format: &OutputFormat,
) -> Result<()> {
    if count == Some(0) {
        return Ok(());
    }

    let out_format: format::OutputFormat = format.into();
    let mut seen = 0;
    let mut failure = None;

    client
        .stream_events(|notification| {
            match format::format_notification(&notification, &out_format) {
                Ok(line) => println!("{}", line),
                Err(e) => {
                    failure = Some(e);
                    return ControlFlow::Break(());
                }
            }
            seen += 1;
            if count.is_some_and(|count| seen >= count) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await?;

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Handle config commands
pub async fn handle_config(
    command: ConfigCommands,
    current_config: &CliConfig,
    format: &OutputFormat,
) -> Result<()> {
    match command {
        ConfigCommands::Show => match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(current_config)?);
            }
            OutputFormat::Table => {
                println!("CLI Configuration:");
                println!("{:<20} Value", "Setting");
                println!("{}", "-".repeat(40));
                println!("{:<20} {}", "Server URL", current_config.server_url);
                println!("{:<20} {}", "Output Format", current_config.output_format);
                println!("{:<20} {}", "Verbose", current_config.verbose);
                println!("{:<20} {}s", "Timeout", current_config.timeout);
            }
        },
        ConfigCommands::Set { key, value } => {
            let config = apply_setting(current_config.clone(), &key, &value)?;
            config.save()?;
            println!("{}", format_success(&format!("Set {} = {}", key, value)));
        }
        ConfigCommands::Reset => {
            CliConfig::default().save()?;
            println!("{}", format_success("Configuration reset to defaults"));
        }
    }

    Ok(())
}

/// Apply one `config set` key, validating the value through the builder
fn apply_setting(config: CliConfig, key: &str, value: &str) -> Result<CliConfig> {
    let builder = CliConfig::builder()
        .with_server_url(config.server_url)?
        .with_output_format(config.output_format)?
        .with_verbose(config.verbose)
        .with_timeout(config.timeout)?;

    let builder = match key {
        "server_url" => builder.with_server_url(value)?,
        "output_format" => builder.with_output_format(value)?,
        "verbose" => builder.with_verbose(value.eq_ignore_ascii_case("true") || value == "1"),
        "timeout" => builder.with_timeout(
            value
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid timeout value. Must be a number"))?,
        )?,
        _ => return Err(anyhow::anyhow!("Unknown config key: {}", key)),
    };

    builder.build()
}

/// Generate shell completion script
pub fn generate_completion(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_setting() {
        let config = apply_setting(CliConfig::default(), "timeout", "30").unwrap();
        assert_eq!(config.timeout, 30);

        let config = apply_setting(config, "verbose", "1").unwrap();
        assert!(config.verbose);
        assert_eq!(config.timeout, 30);
    }

    #[test]
    fn test_apply_setting_rejects_bad_values() {
        assert!(apply_setting(CliConfig::default(), "output_format", "xml").is_err());
        assert!(apply_setting(CliConfig::default(), "timeout", "soon").is_err());
        assert!(apply_setting(CliConfig::default(), "server_url", "localhost").is_err());
        assert!(apply_setting(CliConfig::default(), "colour", "red").is_err());
    }
}
