//! Error types for pool lifecycle operations.

/// Enumeration of possible worker-pool errors.
///
/// Lifecycle errors are fatal to the call that produced them, never to the
/// pool as a whole: a failed `start` leaves an already-running subset of
/// workers behind and the caller decides whether to `stop` and abort.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The pool has been stopped; pushes and lifecycle calls are rejected
    #[error("worker pool `{0}` is stopped")]
    Stopped(String),

    /// The OS refused to create a worker thread
    #[error("failed to spawn worker thread for pool `{pool}`")]
    Spawn {
        /// Name of the pool that failed to grow
        pool: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },
}
