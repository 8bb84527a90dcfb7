//! Main application logic and lifecycle management.
//!
//! This module contains the core `Application` struct that orchestrates
//! simulation startup, monitoring, and graceful shutdown.

use crate::{cli::CliArgs, config::AppConfig, logging::display_banner, signals};
use sim_pipeline::{
    AuthProvider, LoggingSink, MemoryAuthProvider, Simulation, SkillDef, SkillRegistry,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use world_core::{Actor, ActorId, SkillId, UserId, Vec3};

/// Demo skill: a wave emote whose return code is its effective power.
const SKILL_WAVE: SkillId = SkillId(1);
/// Retired alias kept for old clients; substituted by [`SKILL_WAVE`].
const SKILL_GREET: SkillId = SkillId(2);

/// Main application struct.
///
/// The `Application` struct manages the complete lifecycle of the Meridian
/// server: configuration loading, simulation initialization, health
/// monitoring, and graceful shutdown handling.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// The running simulation core
    simulation: Arc<Simulation>,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// Loads configuration, applies CLI overrides, validates settings, and
    /// builds the simulation with the bundled in-memory world.
    ///
    /// # Arguments
    ///
    /// * `args` - Parsed command-line arguments
    ///
    /// # Returns
    ///
    /// A configured `Application` instance ready to run, or an error if
    /// initialization failed.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        if let Some(motion_workers) = args.motion_workers {
            config.pools.motion = motion_workers;
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let provider: Arc<dyn AuthProvider> = Arc::new(demo_world());
        let simulation = Arc::new(Simulation::new(
            config.to_zone_config(),
            provider,
            Arc::new(LoggingSink),
            config.pools.to_pool_sizes(),
        ));
        install_demo_skills(simulation.skills());

        info!("🚀 Meridian World Server v{}", env!("CARGO_PKG_VERSION"));
        info!(
            "📂 Config: {} | {} actors loaded | {} skills registered",
            args.config_path.display(),
            simulation.zone().actor_count(),
            simulation.skills().len()
        );

        Ok(Self { config, simulation })
    }

    /// Runs the application until a termination signal arrives.
    ///
    /// Starts the stage pools, reports queue health once a minute, waits for
    /// SIGINT/SIGTERM, and shuts the pipeline down in flow order. A second
    /// signal during shutdown exits immediately.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Meridian World Server");
        self.log_configuration_summary();

        self.simulation.start()?;

        let monitoring_handle = {
            let simulation = self.simulation.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(60));
                interval.tick().await;
                loop {
                    interval.tick().await;
                    let depths = simulation.queue_depths();
                    info!(
                        "📊 Health - {} actors | {} sessions | queues {:?}",
                        simulation.zone().actor_count(),
                        simulation.sessions().len(),
                        depths
                    );
                    let backlog: usize = depths.iter().map(|(_, n)| n).sum();
                    if backlog > 10_000 {
                        warn!("🔥 Queue backlog of {} items across stages", backlog);
                    }
                }
            })
        };

        info!("✅ Meridian is now running!");
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        signals::wait_for_shutdown().await?;

        // Second signal during shutdown: exit without ceremony.
        tokio::spawn(async move {
            if let Err(e) = signals::wait_for_shutdown_silent().await {
                error!("Failed to set up second-signal handler: {e}");
                return;
            }
            warn!("Shutdown signal received again! Exiting immediately.");
            std::process::exit(1);
        });

        info!("🛑 Shutdown signal received, beginning graceful shutdown...");
        monitoring_handle.abort();

        info!("📡 Phase 1: Stopping request intake and stage pools...");
        self.simulation.stop();
        info!("📡 Phase 2: Session send queues stopped");

        info!(
            "📊 Final state: {} actors, {} sessions",
            self.simulation.zone().actor_count(),
            self.simulation.sessions().len()
        );
        info!("👋 Meridian shut down cleanly");
        Ok(())
    }

    fn log_configuration_summary(&self) {
        let w = &self.config.world;
        info!("🗺️ World: {:?} sectors of {:?} units", w.sector_counts, w.sector_size);
        info!(
            "🌳 Octree: depth {}..={}, {} objects per leaf",
            w.octree_min_depth, w.octree_max_depth, w.octree_max_leaf_objects
        );
        let sizes = self.config.pools.to_pool_sizes();
        info!(
            "🧵 Pools: access={} action={} motion={} update={}",
            sizes.access, sizes.action, sizes.motion, sizes.update
        );
    }
}

/// The bundled demo world: two avatar accounts and a patrolling drone.
///
/// Stands in for the database collaborator until one is attached.
fn demo_world() -> MemoryAuthProvider {
    MemoryAuthProvider::new()
        .with_account("admin", b"meridian", UserId(1))
        .with_account("scout", b"scout", UserId(2))
        .with_grant("admin", SKILL_WAVE, 50)
        .with_skill(SKILL_WAVE, SkillDef::valid(0, 100))
        .with_skill(SKILL_GREET, SkillDef::substituted_by(SKILL_WAVE))
        .with_object(
            Actor::new(ActorId(1001), Vec3::new(128.0, 128.0, 16.0))
                .with_default_controller(UserId(1)),
        )
        .with_object(
            Actor::new(ActorId(1002), Vec3::new(300.0, 300.0, 16.0))
                .with_default_controller(UserId(2)),
        )
        .with_object(
            Actor::new(ActorId(2001), Vec3::new(64.0, 64.0, 32.0))
                .with_movement(Vec3::new(2.0, 0.0, 0.0)),
        )
}

fn install_demo_skills(skills: &Arc<SkillRegistry>) {
    skills.set_handler(
        SKILL_WAVE,
        Arc::new(|ctx| {
            info!("👋 {} waves at power {}", ctx.actor, ctx.power);
            ctx.power
        }),
    );
}
