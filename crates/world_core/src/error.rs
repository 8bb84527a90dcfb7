//! Error types for world-state operations.

use crate::types::{ActorId, Vec3};

/// Enumeration of possible world-state errors.
///
/// Invariant violations (destroying the root, using a freed node handle)
/// are surfaced as errors by the API contract rather than corrupting state.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The actor id is not present in the entity table
    #[error("unknown actor {0}")]
    UnknownActor(ActorId),

    /// The position does not fall inside any configured sector
    #[error("position ({0:?}) is outside the zone's sector grid")]
    OutOfBounds(Vec3),

    /// The octree root node cannot be destroyed
    #[error("the octree root cannot be destroyed")]
    RootDestruction,

    /// A node handle referenced a freed arena slot
    #[error("stale octree node index")]
    StaleNode,
}
