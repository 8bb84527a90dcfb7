//! # Worker Pool - Bounded Thread-Pool Primitive
//!
//! A named, resizable pool of OS worker threads pulling typed work items from
//! a single shared queue. This is the only concurrency primitive the
//! simulation pipeline is built on: every pipeline stage and every
//! per-session send queue is a `WorkerPool<T>` specialization.
//!
//! ## Design
//!
//! * **One queue, many workers** - producers `push`, workers block-pop; FIFO
//!   order is preserved for a single worker and items are processed exactly
//!   once regardless of pool size.
//! * **Explicit lifecycle** - construction never starts threads; `start`
//!   spins workers up, `stop` wakes and joins them, `resize` grows or shrinks
//!   the live pool without disturbing the queue.
//! * **Crash isolation** - a worker function that fails on one item logs the
//!   error and keeps popping; a worker thread never dies silently.
//! * **No stale work after stop** - a blocked pop wakes on `stop` and the
//!   thread exits without dequeuing anything; late pushes are rejected
//!   instead of being silently dropped.

pub use error::PoolError;
pub use pool::{WorkerFn, WorkerPool};

mod error;
mod pool;
