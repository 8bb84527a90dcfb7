//! # World Core - Shared Spatial World State
//!
//! The authoritative world state of the simulation server: the entity table,
//! the per-sector octree spatial indexes, and the controller/actor driver
//! relation. Everything here is the *shared* mutable state of the pipeline;
//! all other state is owned by exactly one pipeline stage at a time and
//! handed off by message passing.
//!
//! ## Key Types
//!
//! - [`Actor`] - a simulated entity with position and velocity
//! - [`Octree`] - arena-based spatial index with precomputed neighbor links
//! - [`Zone`] - sector grid of octrees plus the authoritative entity table
//! - [`DriverTable`] - the take-over protocol between controllers and actors
//!
//! ## Locking discipline
//!
//! Each sector octree sits behind its own `RwLock`; any operation that moves
//! an actor across a node boundary holds the affected sector locks in
//! sector-index order for the whole remove+reinsert, so readers never observe
//! a half-updated tree. The entity table and driver table are sharded
//! `DashMap`s with per-entry atomicity.

pub use actor::{Actor, ActorFlags};
pub use control::DriverTable;
pub use error::WorldError;
pub use octree::{Direction, NodeIndex, Octree, OctreeConfig};
pub use types::{Aabb, ActorId, SectorCoords, SkillId, UserId, Vec3};
pub use zone::{Zone, ZoneConfig};

pub mod actor;
pub mod control;
pub mod error;
pub mod octree;
pub mod types;
pub mod zone;
