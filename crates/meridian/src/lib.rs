//! # Meridian World Server - Main Entry Point
//!
//! Standalone server binary around the simulation pipeline. This entry
//! point handles CLI parsing, configuration loading, and application
//! lifecycle management.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! meridian
//!
//! # Specify custom configuration
//! meridian --config production.toml
//!
//! # Override specific settings
//! meridian --log-level debug --motion-workers 8
//!
//! # JSON logging for production
//! meridian --json-logs
//! ```
//!
//! ## Configuration
//!
//! The server loads configuration from a TOML file (default:
//! `config.toml`). If the file doesn't exist, a default configuration will
//! be created.
//!
//! ## Signal Handling
//!
//! The server shuts down gracefully on SIGINT (Ctrl+C) and SIGTERM; a
//! second signal during shutdown exits immediately.

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Main entry point for the Meridian World Server.
///
/// Handles the complete application lifecycle:
/// 1. Command-line argument parsing
/// 2. Configuration loading and validation
/// 3. Logging system initialization
/// 4. Application creation and execution
/// 5. Error handling and cleanup
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Load configuration first to get the logging settings.
    let config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default();

    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

// Re-export main types for potential library usage
pub use config::{LoggingSettings, PoolSettings, WorldSettings};

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn default_config_converts_to_zone_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        let zone = config.to_zone_config();
        assert_eq!(zone.sector_counts, [4, 4, 1]);
        assert_eq!(zone.sector_size, world_core::Vec3::new(256.0, 256.0, 256.0));
        assert_eq!(zone.octree.min_depth, 2);
    }

    #[test]
    fn cli_args_structure() {
        let args = CliArgs {
            config_path: PathBuf::from("test.toml"),
            log_level: Some("debug".to_string()),
            json_logs: true,
            motion_workers: Some(8),
        };

        assert_eq!(args.config_path, PathBuf::from("test.toml"));
        assert_eq!(args.log_level, Some("debug".to_string()));
        assert!(args.json_logs);
        assert_eq!(args.motion_workers, Some(8));
    }

    #[tokio::test]
    async fn config_round_trips_through_toml() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let path = dir.path().join("config.toml");

        let config = AppConfig::default();
        let toml_content =
            toml::to_string_pretty(&config).expect("Failed to serialize default config");
        tokio::fs::write(&path, toml_content)
            .await
            .expect("Failed to write test config file");

        let loaded = AppConfig::load_from_file(&path).await.expect("load failed");
        assert!(loaded.validate().is_ok());
        assert_eq!(loaded.world.sector_counts, config.world.sector_counts);
    }
}
