//! CLI command and subcommand definitions

use clap::{Args, Parser, Subcommand};
use kiosk_core::{LedColor, SensorClass};
use std::path::PathBuf;

/// Kiosk sensor bridge CLI
#[derive(Parser, Debug)]
#[command(name = "kioskctl")]
#[command(version, about = "Kiosk sensor bridge CLI", long_about = None)]
pub struct Cli {
    /// Server URL (overrides config file)
    #[arg(short, long)]
    pub server: Option<String>,

    /// Output format (overrides config file)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output (overrides config file)
    #[arg(short, long)]
    pub verbose: bool,

    /// Don't load config file
    #[arg(long)]
    pub no_config: bool,

    /// Config file path (default: <config dir>/kiosk-sensors/cli.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty table output
    Table,
    /// JSON output
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
        }
    }
}

impl From<&OutputFormat> for crate::format::OutputFormat {
    fn from(format: &OutputFormat) -> Self {
        match format {
            OutputFormat::Table => crate::format::OutputFormat::Table,
            OutputFormat::Json => crate::format::OutputFormat::Json,
        }
    }
}

/// Accepts `a`/`presence` and `b`/`light`
fn parse_class(value: &str) -> Result<SensorClass, String> {
    value.parse().map_err(|e: kiosk_core::KioskError| e.to_string())
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show daemon information
    Info,

    /// List the ports available to a sensor class
    Ports {
        /// Sensor class (presence | light)
        #[arg(value_parser = parse_class)]
        class: SensorClass,

        /// Rescan attached devices first
        #[arg(long)]
        refresh: bool,
    },

    /// Start a sensor session on a port
    Start {
        /// Sensor class (presence | light)
        #[arg(value_parser = parse_class)]
        class: SensorClass,

        /// Port name as shown by `ports`
        port: String,

        /// Threshold level for presence sensors
        #[arg(short, long)]
        level: Option<i32>,
    },

    /// Stop the session of a sensor class
    Stop {
        /// Sensor class (presence | light)
        #[arg(value_parser = parse_class)]
        class: SensorClass,
    },

    /// Show both sensor sessions
    Sessions,

    /// Request access to the device behind a port
    Permission {
        /// Port name
        port: String,
    },

    /// Re-detect multi-port adapter aliases
    Detect,

    /// Direct light commands
    Light {
        #[command(subcommand)]
        command: LightCommands,
    },

    /// Follow the daemon's notification stream
    Events {
        /// Stop after this many events
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Show or manage CLI configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Colour and duration of a light command
#[derive(Args, Debug, Clone)]
pub struct ColorArgs {
    /// Red channel
    pub red: u8,
    /// Green channel
    pub green: u8,
    /// Blue channel
    pub blue: u8,
    /// Duration seconds component
    #[arg(long, default_value_t = 1)]
    pub seconds: u32,
    /// Duration minutes component
    #[arg(long, default_value_t = 0)]
    pub minutes: u32,
    /// Vendor display mode
    #[arg(long, default_value_t = 0)]
    pub mode: u32,
}

impl From<ColorArgs> for LedColor {
    fn from(args: ColorArgs) -> Self {
        LedColor {
            red: args.red,
            green: args.green,
            blue: args.blue,
            seconds: args.seconds,
            minutes: args.minutes,
            mode: args.mode,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum LightCommands {
    /// List the serial ports the vendor SDK can see
    ComList,

    /// Check whether a port is open
    IsOpen {
        /// Port name or SerialCOM alias
        port: String,
    },

    /// Open a port
    Open {
        /// Port name or SerialCOM alias
        port: String,
        /// Baud rate (0 lets the SDK choose)
        #[arg(short, long, default_value_t = 0)]
        baud: u32,
    },

    /// Close a port
    Close {
        /// Port name or SerialCOM alias
        port: String,
    },

    /// Set the colour on an open port
    Color {
        /// Port name or SerialCOM alias
        port: String,
        #[command(flatten)]
        color: ColorArgs,
    },

    /// Open the port, show a colour and close it again
    Show {
        /// Port name or SerialCOM alias
        port: String,
        #[command(flatten)]
        color: ColorArgs,
    },

    /// Switch to flash mode
    Flash {
        /// Port name or SerialCOM alias
        port: String,
    },

    /// Switch to smooth mode
    Smooth {
        /// Port name or SerialCOM alias
        port: String,
    },

    /// Stop the running light mode
    Stop {
        /// Port name or SerialCOM alias
        port: String,
    },

    /// Switch to breathe mode
    Breathe {
        /// Port name or SerialCOM alias
        port: String,
        /// Breathe pattern
        #[arg(short, long, default_value_t = 0)]
        pattern: u32,
    },

    /// Read the light status
    Status {
        /// Port name or SerialCOM alias
        port: String,
        /// Show the raw status bytes
        #[arg(long)]
        raw: bool,
    },

    /// Read the firmware version
    Firmware {
        /// Port name or SerialCOM alias
        port: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },

    /// Reset configuration to defaults
    Reset,
}
