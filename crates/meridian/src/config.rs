//! Configuration management for the Meridian world server.
//!
//! This module handles loading, validation, and conversion of server
//! configuration from TOML files and command-line arguments.

use serde::{Deserialize, Serialize};
use sim_pipeline::PoolSizes;
use std::path::PathBuf;
use tracing::info;
use world_core::{OctreeConfig, Vec3, ZoneConfig};

/// Default sector size for serde deserialization
fn default_sector_size() -> [f64; 3] {
    [256.0, 256.0, 256.0]
}

/// Default sector grid dimensions
fn default_sector_counts() -> [usize; 3] {
    [4, 4, 1]
}

fn default_min_depth() -> u8 {
    2
}

fn default_max_depth() -> u8 {
    6
}

fn default_max_leaf_objects() -> usize {
    16
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Application configuration loaded from TOML file.
///
/// This is the main configuration structure that encompasses all server
/// settings: world geometry, stage pool sizing, and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// World geometry settings
    pub world: WorldSettings,
    /// Stage pool sizing settings
    #[serde(default)]
    pub pools: PoolSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// World geometry: the sector grid and per-sector octree bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSettings {
    /// World position of the sector grid's minimum corner
    #[serde(default)]
    pub origin: [f64; 3],
    /// Dimensions of one sector in world units
    #[serde(default = "default_sector_size")]
    pub sector_size: [f64; 3],
    /// Number of sectors along each axis
    #[serde(default = "default_sector_counts")]
    pub sector_counts: [usize; 3],
    /// Octree depth floor: subdivision always reaches at least this depth
    #[serde(default = "default_min_depth")]
    pub octree_min_depth: u8,
    /// Octree depth ceiling: no node sits deeper than this
    #[serde(default = "default_max_depth")]
    pub octree_max_depth: u8,
    /// Leaf capacity between the depth bounds
    #[serde(default = "default_max_leaf_objects")]
    pub octree_max_leaf_objects: usize,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            origin: [0.0, 0.0, 0.0],
            sector_size: default_sector_size(),
            sector_counts: default_sector_counts(),
            octree_min_depth: default_min_depth(),
            octree_max_depth: default_max_depth(),
            octree_max_leaf_objects: default_max_leaf_objects(),
        }
    }
}

/// Worker counts per pipeline stage; zero means "choose from CPU count".
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PoolSettings {
    #[serde(default)]
    pub access: usize,
    #[serde(default)]
    pub action: usize,
    #[serde(default)]
    pub motion: usize,
    #[serde(default)]
    pub update: usize,
}

impl PoolSettings {
    /// Resolves configured sizes against the CPU-derived defaults.
    pub fn to_pool_sizes(self) -> PoolSizes {
        let auto = PoolSizes::default();
        let pick = |configured: usize, auto: usize| if configured == 0 { auto } else { configured };
        PoolSizes {
            access: pick(self.access, auto.access),
            action: pick(self.action, auto.action),
            motion: pick(self.motion, auto.motion),
            update: pick(self.update, auto.update),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to emit structured JSON log lines
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            world: WorldSettings::default(),
            pools: PoolSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at
    /// the specified path and returns the default configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The loaded or default configuration, or an error if loading/creation
    /// failed.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the world settings into the zone's geometry configuration.
    pub fn to_zone_config(&self) -> ZoneConfig {
        let w = &self.world;
        ZoneConfig {
            origin: Vec3::new(w.origin[0], w.origin[1], w.origin[2]),
            sector_size: Vec3::new(w.sector_size[0], w.sector_size[1], w.sector_size[2]),
            sector_counts: w.sector_counts,
            octree: OctreeConfig {
                min_depth: w.octree_min_depth,
                max_depth: w.octree_max_depth,
                max_leaf_objects: w.octree_max_leaf_objects,
            },
        }
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing
    /// the issue.
    pub fn validate(&self) -> Result<(), String> {
        let w = &self.world;
        if w.sector_counts.iter().any(|&n| n == 0) {
            return Err("world.sector_counts components must all be greater than 0".to_string());
        }
        if w.sector_size.iter().any(|&s| s <= 0.0) {
            return Err("world.sector_size components must all be positive".to_string());
        }
        if w.octree_min_depth > w.octree_max_depth {
            return Err(format!(
                "world.octree_min_depth ({}) must not exceed octree_max_depth ({})",
                w.octree_min_depth, w.octree_max_depth
            ));
        }
        if w.octree_max_leaf_objects == 0 {
            return Err("world.octree_max_leaf_objects must be greater than 0".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
