//! Error types for pipeline lifecycle operations.

use worker_pool::PoolError;
use world_core::WorldError;

/// Enumeration of possible pipeline errors.
///
/// Per-request failures (bad credentials, invalid skill, unknown actor) are
/// not errors; they are outcomes of the stage that handled them. These
/// variants cover lifecycle and world-consistency failures only.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A stage pool refused a lifecycle call
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The world rejected a state mutation
    #[error(transparent)]
    World(#[from] WorldError),
}
