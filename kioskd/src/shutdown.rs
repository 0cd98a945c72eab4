//! Shutdown handling for graceful daemon termination
//!
//! Waits for a termination signal, then closes both sensor sessions so the
//! ports are released and no poll survives the daemon.

use crate::session::SessionHandle;
use tokio::signal;
use tracing::{error, info};

/// Wait for Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

/// Close all sessions and stop the session manager
pub async fn release_sessions(session: &SessionHandle) {
    info!("Releasing sensor sessions...");
    session.shutdown().await;
    info!("Sensor sessions released");
}
