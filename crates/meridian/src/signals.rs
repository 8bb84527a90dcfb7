//! Signal handling for graceful server shutdown.
//!
//! This module provides cross-platform signal handling to allow the server
//! to shut down gracefully when receiving termination signals. A second
//! signal during shutdown is handled by the application as a hard exit.

use tokio::signal;
use tracing::info;

/// Waits for a termination signal.
///
/// Listens for SIGINT and SIGTERM on Unix (Ctrl+C on Windows) and returns
/// when one is received.
///
/// # Returns
///
/// `Ok(())` when a shutdown signal arrives, or an error if signal handling
/// setup failed.
pub async fn wait_for_shutdown() -> Result<(), Box<dyn std::error::Error>> {
    wait_for_shutdown_silent().await?;
    info!("📡 Received shutdown signal - initiating graceful shutdown");
    Ok(())
}

/// Same as [`wait_for_shutdown`] without the arrival log line; used for the
/// second-signal hard-exit watcher.
pub async fn wait_for_shutdown_silent() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    Ok(())
}
