//! Kiosk sensor bridge CLI
//!
//! Command-line interface for the kiosk sensor bridge daemon.

use anyhow::Result;
use clap::Parser;
use kioskctl::cli::{
    generate_completion, handle_config, handle_detect, handle_events, handle_info, handle_light,
    handle_permission, handle_ports, handle_sessions, handle_start, handle_stop, Cli, Commands,
    OutputFormat,
};
use kioskctl::client::KioskClient;
use kioskctl::config::CliConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build configuration using priority chain: defaults → file → env → CLI args
    let mut builder = CliConfig::builder();

    if !cli.no_config {
        builder = builder.with_config_file(cli.config.as_deref())?;
    }

    builder = builder.with_env_overrides();

    if let Some(ref server) = cli.server {
        builder = builder.with_server_url(server)?;
    }
    if let Some(ref format) = cli.format {
        builder = builder.with_output_format(format.as_str())?;
    }
    if cli.verbose {
        builder = builder.with_verbose(true);
    }

    let config = match builder.build() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            if cli.verbose {
                eprintln!("Error details: {:?}", e);
            }
            std::process::exit(1);
        }
    };

    let output_format = match config.output_format.as_str() {
        "json" => OutputFormat::Json,
        _ => OutputFormat::Table,
    };
    let verbose = config.verbose;

    if verbose {
        eprintln!("Verbose mode enabled");
        eprintln!("Server URL: {}", config.server_url);
        eprintln!("Output format: {:?}", output_format);
    }

    // Commands that never talk to the daemon
    match cli.command {
        Commands::Config { command } => {
            return report(handle_config(command, &config, &output_format).await, verbose);
        }
        Commands::Completion { shell } => {
            generate_completion(shell);
            return Ok(());
        }
        _ => {}
    }

    let client = match KioskClient::with_config(
        config.server_url.clone(),
        config.timeout,
        3,
        std::time::Duration::from_millis(500),
    ) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: Cannot create client for {}", config.server_url);
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Info => handle_info(&client, &output_format).await,
        Commands::Ports { class, refresh } => {
            handle_ports(&client, class, refresh, &output_format).await
        }
        Commands::Start { class, port, level } => {
            handle_start(&client, class, &port, level, &output_format).await
        }
        Commands::Stop { class } => handle_stop(&client, class, &output_format).await,
        Commands::Sessions => handle_sessions(&client, &output_format).await,
        Commands::Permission { port } => handle_permission(&client, &port, &output_format).await,
        Commands::Detect => handle_detect(&client, &output_format).await,
        Commands::Light { command } => handle_light(&client, command, &output_format).await,
        Commands::Events { count } => handle_events(&client, count, &output_format).await,
        Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
    };

    report(result, verbose)
}

/// Print a command failure and exit nonzero
fn report(result: Result<()>, verbose: bool) -> Result<()> {
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        if verbose {
            eprintln!("Error details: {:?}", e);
        }
        std::process::exit(1);
    }
    Ok(())
}
