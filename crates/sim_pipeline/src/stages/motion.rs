//! Motion stage: position integration over elapsed wall time.
//!
//! There is no fixed tick. Each dequeue integrates the actor over however
//! much wall time passed since its last integration, updates its octree
//! and sector membership, and reports whether the actor should be
//! re-enqueued (it still carries velocity) and whether a broadcast is due.
//! A stationary actor passes through unchanged and falls out of the loop,
//! so an idle world costs nothing.

use std::time::Instant;
use tracing::warn;
use world_core::{ActorId, Vec3, WorldError, Zone};

/// Result of one integration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionOutcome {
    /// Wall seconds integrated over
    pub elapsed: f64,
    /// Position before the step
    pub old_pos: Vec3,
    /// Position after the step (equals `old_pos` when stationary or halted)
    pub new_pos: Vec3,
    /// Whether the step crossed a sector boundary
    pub crossed_sector: bool,
    /// Whether the actor still carries velocity and belongs back on the queue
    pub requeue: bool,
}

/// Integrates one actor at `now`.
///
/// An actor that would leave the sector grid is halted at its previous
/// position with its velocity cleared; the world edge is a wall. Returns
/// `None` for unknown actors (despawned while queued), which the caller
/// treats as a dropped request.
pub fn integrate(zone: &Zone, actor: ActorId, now: Instant) -> Option<MotionOutcome> {
    let (old_pos, new_pos, elapsed, moving) = zone.with_actor_mut(actor, |a| {
        let old = a.position;
        let elapsed = a.integrate(now);
        (old, a.position, elapsed, a.is_moving())
    })?;

    if new_pos == old_pos {
        return Some(MotionOutcome {
            elapsed,
            old_pos,
            new_pos,
            crossed_sector: false,
            requeue: moving,
        });
    }

    let crossed_sector = match zone.update_membership(actor, old_pos, new_pos) {
        Ok(crossed) => crossed,
        Err(WorldError::OutOfBounds(_)) => {
            warn!("🛑 {} hit the world edge at {:?}, halted", actor, new_pos);
            zone.with_actor_mut(actor, |a| {
                a.position = old_pos;
                a.movement = Vec3::zero();
                a.rotation_rate = Vec3::zero();
            });
            return Some(MotionOutcome {
                elapsed,
                old_pos,
                new_pos: old_pos,
                crossed_sector: false,
                requeue: false,
            });
        }
        Err(WorldError::UnknownActor(_)) => {
            // Despawned between the integration step and the octree update;
            // the zone already rolled the registration back.
            return None;
        }
        Err(e) => {
            warn!("Membership update failed for {}: {e}", actor);
            false
        }
    };

    Some(MotionOutcome {
        elapsed,
        old_pos,
        new_pos,
        crossed_sector,
        requeue: moving,
    })
}
