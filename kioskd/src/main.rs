//! Kiosk sensor bridge daemon
//!
//! Owns the USB presence sensor and status light sessions and exposes them
//! over a REST API with a server-sent event stream of notifications.
//!
//! # Mock Mode
//!
//! With `--mock` the daemon runs against a simulated vendor SDK and a fixed
//! set of simulated devices, and every access request is granted.

mod api;
mod config;
mod hotplug;
mod permission;
mod session;
mod shutdown;

use anyhow::Result;
use api::AppState;
use clap::Parser;
use kiosk_core::{default_config_path, PermissionPolicy, StaticConfig, UsbDevice};
use kiosk_hardware::{MockRegistry, MockSdk, SerialPortRegistry, SerialSdk, UsbRegistry, VendorSdk};
use session::SessionManager;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Kiosk sensor bridge daemon
#[derive(Parser, Debug)]
#[command(name = "kioskd")]
#[command(version, about = "Kiosk USB sensor bridge daemon", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server bind address
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: String,

    /// Server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging (also traces serial traffic)
    #[arg(short, long)]
    verbose: bool,

    /// Enable mock mode (run without hardware for testing/development)
    #[arg(long)]
    mock: bool,
}

/// Devices presented by the simulated registry
fn mock_devices() -> Vec<UsbDevice> {
    let mut sensor = UsbDevice::new("/dev/ttyMOCK0", 0x0F10, 0x0100);
    sensor.product = Some("Mock presence sensor".to_string());
    let mut light = UsbDevice::new("/dev/ttyMOCK1", 0x0F10, 0x0200);
    light.product = Some("Mock status light".to_string());
    let mut adapter = UsbDevice::new("/dev/ttyMOCK2", 0x9710, 0x7840);
    adapter.product = Some("Mock serial adapter".to_string());
    vec![sensor, light, adapter]
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    init_tracing(args.verbose);

    info!("Kiosk sensor bridge starting...");

    // Determine config path: CLI flag > env var > default
    let config_path = args.config.unwrap_or_else(|| {
        std::env::var("KIOSK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path())
    });
    info!("Configuration file: {}", config_path.display());

    let mut static_config: StaticConfig = config::load_static_config(&config_path).await?;
    info!("Configuration loaded successfully");

    let port = args.port.unwrap_or(static_config.server.port);
    let bind_addr = format!("{}:{}", args.bind, port);

    let (sdk, registry): (Box<dyn VendorSdk>, Arc<dyn UsbRegistry>) = if args.mock {
        info!("Mock mode: simulated SDK with {} devices", mock_devices().len());
        if static_config.permission.policy != PermissionPolicy::AutoGrant {
            warn!(
                "Mock mode: overriding permission policy {:?} with auto_grant",
                static_config.permission.policy
            );
            static_config.permission.policy = PermissionPolicy::AutoGrant;
        }
        (
            Box::new(MockSdk::with_ports(
                mock_devices().into_iter().map(|device| device.name),
            )),
            Arc::new(MockRegistry::with_devices(mock_devices())),
        )
    } else {
        (
            Box::new(SerialSdk::new(
                static_config.server.vendor_timeout_ms,
                static_config.presence.baud_rate,
                args.verbose,
            )),
            Arc::new(SerialPortRegistry::new()),
        )
    };

    let static_config = Arc::new(static_config);
    let (session, session_task) = SessionManager::spawn(static_config, sdk, registry);

    let session_for_shutdown = session.clone();
    let app_state = AppState::new(session, args.mock);

    // Set up API router
    let app = api::create_router(app_state);

    // Start server
    info!("Starting server on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Kiosk sensor bridge listening on {}", bind_addr);
    info!("Server ready!");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown::shutdown_signal().await;
            shutdown::release_sessions(&session_for_shutdown).await;
        })
        .await?;

    if let Err(e) = session_task.await {
        warn!("Session manager task ended abnormally: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
