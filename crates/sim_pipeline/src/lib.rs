//! # Simulation Pipeline - Access, Action, Motion, Update
//!
//! The four-stage pipeline that turns decoded client requests into world
//! mutations and outbound broadcasts. Each stage is a
//! [`WorkerPool`](worker_pool::WorkerPool) specialization with a dedicated
//! worker function:
//!
//! 1. **Access** - login/logout; creates and destroys the controller/actor
//!    driver link and the session record.
//! 2. **Action** - validates and executes a skill invocation against an
//!    actor through the pluggable skill registry.
//! 3. **Motion** - integrates actor positions over elapsed wall time,
//!    maintains octree/sector membership, and re-enqueues moving actors
//!    onto its own queue. There is no fixed frame rate: an actor's
//!    simulation cadence is exactly as fast as a motion worker can dequeue
//!    it, bounded only by pool size and queue depth.
//! 4. **Update** - encodes the new state as a fixed-point broadcast record
//!    and fans it out to every connected session's own send queue, stamping
//!    each recipient's private sequence number.
//!
//! External collaborators (database, socket transport, skill scripting) sit
//! behind the [`AuthProvider`], [`PacketSink`] and skill-handler seams; the
//! pipeline never implements them.

pub use auth::{AuthProvider, MemoryAuthProvider};
pub use error::PipelineError;
pub use requests::{
    AccessRequest, ActionRequest, LoginRequest, LogoutRequest, MotionRequest, OutboundBody,
    OutboundPacket, UpdateRequest,
};
pub use session::{CollectingSink, LoggingSink, PacketSink, Session, SessionRegistry};
pub use simulation::{PoolSizes, Simulation};
pub use skills::{SkillContext, SkillDef, SkillHandler, SkillRegistry};

pub mod auth;
pub mod error;
pub mod requests;
pub mod session;
pub mod simulation;
pub mod skills;
pub mod stages;
pub mod wire;

#[cfg(test)]
mod tests;
