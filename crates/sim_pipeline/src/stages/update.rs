//! Update stage: state broadcast.
//!
//! Snapshots the actor into a fixed-point wire record and enqueues it on
//! every connected session's send queue, where each session stamps its own
//! sequence number. Invisible actors and actors despawned while queued
//! produce no broadcast.

use tracing::trace;
use world_core::{ActorId, Zone};

use crate::requests::OutboundBody;
use crate::session::SessionRegistry;
use crate::wire::PositionRecord;

/// Broadcasts one actor's state to every live session.
///
/// # Returns
///
/// The number of sessions the update was enqueued for.
pub fn broadcast(zone: &Zone, sessions: &SessionRegistry, actor: ActorId) -> usize {
    let Some(snapshot) = zone.get_actor(actor) else {
        return 0;
    };
    if snapshot.flags.invisible {
        return 0;
    }
    let record = PositionRecord::encode(&snapshot);
    let count = sessions.broadcast(OutboundBody::PositionUpdate(record));
    trace!("📡 {} broadcast to {} sessions", actor, count);
    count
}
