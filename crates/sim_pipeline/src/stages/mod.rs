//! The four pipeline stages.
//!
//! Each submodule is the pure logic of one stage, written as free functions
//! over the shared world and session state. Pool wiring (which pool feeds
//! which, self-requeue, pool lifecycle) lives in
//! [`simulation`](crate::simulation); keeping the stage bodies free of pool
//! handles makes them directly callable from tests.

pub mod access;
pub mod action;
pub mod motion;
pub mod update;
