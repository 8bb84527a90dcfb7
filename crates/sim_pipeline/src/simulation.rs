//! The assembled pipeline: four stage pools over one zone.
//!
//! [`Simulation`] owns the pool lifecycles and the wiring between stages:
//! motion feeds update and re-enqueues itself for moving actors. Stage
//! logic itself lives in [`stages`](crate::stages); the closures installed
//! here only adapt pool items to those functions.

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use worker_pool::WorkerPool;
use world_core::{Actor, ActorId, UserId, Zone, ZoneConfig};

use crate::auth::AuthProvider;
use crate::error::PipelineError;
use crate::requests::{AccessRequest, ActionRequest, LogoutRequest, MotionRequest, UpdateRequest};
use crate::session::{PacketSink, SessionRegistry};
use crate::skills::SkillRegistry;
use crate::stages::{access, action, motion, update};
use crate::wire;

/// Worker counts per stage.
#[derive(Debug, Clone, Copy)]
pub struct PoolSizes {
    pub access: usize,
    pub action: usize,
    pub motion: usize,
    pub update: usize,
}

impl Default for PoolSizes {
    /// Motion and action scale with the host; access and update stay small.
    fn default() -> Self {
        let cpus = num_cpus::get().max(1);
        Self {
            access: 2,
            action: cpus,
            motion: cpus,
            update: 2,
        }
    }
}

/// The running simulation core.
///
/// Construction loads the world and skill table from the provider but
/// starts no threads; [`start`](Self::start) brings the stage workers up
/// and [`stop`](Self::stop) tears them down in pipeline order. A stopped
/// simulation stays stopped.
pub struct Simulation {
    zone: Arc<Zone>,
    sessions: Arc<SessionRegistry>,
    skills: Arc<SkillRegistry>,
    provider: Arc<dyn AuthProvider>,
    access_pool: Arc<WorkerPool<AccessRequest>>,
    action_pool: Arc<WorkerPool<ActionRequest>>,
    motion_pool: Arc<WorkerPool<MotionRequest>>,
    update_pool: Arc<WorkerPool<UpdateRequest>>,
}

impl Simulation {
    /// Builds the simulation: zone from config, skills and persistent world
    /// objects from the provider.
    pub fn new(
        config: ZoneConfig,
        provider: Arc<dyn AuthProvider>,
        sink: Arc<dyn PacketSink>,
        sizes: PoolSizes,
    ) -> Self {
        let zone = Arc::new(Zone::new(config));
        let skills = Arc::new(SkillRegistry::new());
        for (id, def) in provider.server_skills() {
            skills.register(id, def);
        }
        zone.load(provider.server_objects());

        Self {
            zone,
            sessions: Arc::new(SessionRegistry::new(sink)),
            skills,
            provider,
            access_pool: Arc::new(WorkerPool::new("access", sizes.access)),
            action_pool: Arc::new(WorkerPool::new("action", sizes.action)),
            motion_pool: Arc::new(WorkerPool::new("motion", sizes.motion)),
            update_pool: Arc::new(WorkerPool::new("update", sizes.update)),
        }
    }

    /// Starts all four stage pools, downstream first so no request ever
    /// waits on an unstarted consumer.
    ///
    /// Moving actors already loaded into the zone are kicked onto the
    /// motion queue.
    pub fn start(&self) -> Result<(), PipelineError> {
        {
            let zone = self.zone.clone();
            let sessions = self.sessions.clone();
            self.update_pool.start(move |req: UpdateRequest| {
                update::broadcast(&zone, &sessions, req.actor);
                Ok(())
            })?;
        }

        {
            let zone = self.zone.clone();
            let update_pool = self.update_pool.clone();
            // Weak self-handle: the pool must not own the closure that owns
            // the pool.
            let motion_pool = Arc::downgrade(&self.motion_pool);
            self.motion_pool.start(move |req: MotionRequest| {
                let Some(outcome) = motion::integrate(&zone, req.actor, Instant::now()) else {
                    return Ok(());
                };
                let _ = update_pool.push(UpdateRequest { actor: req.actor });
                if outcome.requeue {
                    if let Some(pool) = motion_pool.upgrade() {
                        let _ = pool.push(req);
                    }
                }
                Ok(())
            })?;
        }

        {
            let zone = self.zone.clone();
            let sessions = self.sessions.clone();
            let skills = self.skills.clone();
            self.action_pool.start(move |req: ActionRequest| {
                action::handle(&zone, &sessions, &skills, &req);
                Ok(())
            })?;
        }

        {
            let zone = self.zone.clone();
            let sessions = self.sessions.clone();
            let provider = self.provider.clone();
            self.access_pool.start(move |req: AccessRequest| {
                match req {
                    AccessRequest::Login(mut login) => {
                        access::handle_login(&zone, &sessions, provider.as_ref(), &mut login);
                    }
                    AccessRequest::Logout(logout) => {
                        access::handle_logout(&zone, &sessions, logout);
                    }
                }
                Ok(())
            })?;
        }

        let mut kicked = 0usize;
        for actor in self.zone.moving_actor_ids() {
            self.motion_pool.push(MotionRequest { actor })?;
            kicked += 1;
        }
        info!("🚀 Simulation started ({} moving actors kicked)", kicked);
        Ok(())
    }

    /// Stops the pipeline in flow order: intake first, then each downstream
    /// stage, then the per-session send queues.
    pub fn stop(&self) {
        self.access_pool.stop();
        self.action_pool.stop();
        self.motion_pool.stop();
        self.update_pool.stop();
        self.sessions.stop_all();
        info!("🛑 Simulation stopped");
    }

    /// Parses a network-order login frame and enqueues it.
    ///
    /// # Returns
    ///
    /// `Ok(false)` when the frame was malformed and dropped.
    pub fn submit_login_frame(&self, frame: &[u8]) -> Result<bool, PipelineError> {
        let Some(login) = wire::parse_login(frame) else {
            warn!("Malformed login frame ({} bytes), dropped", frame.len());
            return Ok(false);
        };
        self.access_pool.push(AccessRequest::Login(login))?;
        Ok(true)
    }

    /// Parses a network-order action frame and enqueues it.
    pub fn submit_action_frame(&self, frame: &[u8]) -> Result<bool, PipelineError> {
        let Some(req) = wire::parse_action(frame) else {
            warn!("Malformed action frame ({} bytes), dropped", frame.len());
            return Ok(false);
        };
        self.action_pool.push(req)?;
        Ok(true)
    }

    /// Enqueues an orderly logout.
    pub fn submit_logout(&self, user: UserId) -> Result<(), PipelineError> {
        self.access_pool
            .push(AccessRequest::Logout(LogoutRequest { user }))?;
        Ok(())
    }

    /// Enqueues a state broadcast for every actor near `actor`: itself plus
    /// everyone in its octree leaf or one of that leaf's neighbor nodes.
    ///
    /// The transport collaborator calls this to refresh a client's picture
    /// of its surroundings, typically right after login or a teleport.
    ///
    /// # Returns
    ///
    /// The number of broadcasts enqueued; zero for an unknown actor.
    pub fn send_nearby_actors(&self, actor: ActorId) -> Result<usize, PipelineError> {
        let nearby = self.zone.nearby_actor_ids(actor);
        let count = nearby.len();
        for id in nearby {
            self.update_pool.push(UpdateRequest { actor: id })?;
        }
        Ok(count)
    }

    /// Spawns an actor into the zone, kicking it onto the motion queue if it
    /// carries velocity.
    pub fn spawn_actor(&self, actor: Actor) -> Result<(), PipelineError> {
        let id = actor.id;
        let moving = actor.is_moving();
        self.zone.spawn(actor)?;
        if moving {
            self.motion_pool.push(MotionRequest { actor: id })?;
        }
        Ok(())
    }

    /// Removes an actor, clearing any session that was driving it.
    ///
    /// # Returns
    ///
    /// The controller whose driver link was severed, if any.
    pub fn despawn_actor(&self, actor: ActorId) -> Option<UserId> {
        let severed = self.zone.despawn(actor)?;
        if let Some(session) = self.sessions.get(severed) {
            if session.slave() == Some(actor) {
                session.set_slave(None);
            }
        }
        Some(severed)
    }

    /// Puts an actor (back) on the motion queue.
    ///
    /// Used after an action handler gives a stationary actor velocity.
    pub fn kick_motion(&self, actor: ActorId) -> Result<(), PipelineError> {
        self.motion_pool.push(MotionRequest { actor })?;
        Ok(())
    }

    /// The shared world state.
    pub fn zone(&self) -> &Arc<Zone> {
        &self.zone
    }

    /// The live session registry.
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// The skill registry, for handler installation.
    pub fn skills(&self) -> &Arc<SkillRegistry> {
        &self.skills
    }

    /// Queue depths per stage, for status reporting.
    pub fn queue_depths(&self) -> [(&'static str, usize); 4] {
        [
            ("access", self.access_pool.queue_size()),
            ("action", self.action_pool.queue_size()),
            ("motion", self.motion_pool.queue_size()),
            ("update", self.update_pool.queue_size()),
        ]
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("actors", &self.zone.actor_count())
            .field("sessions", &self.sessions.len())
            .field("queues", &self.queue_depths())
            .finish()
    }
}
