//! The controller/actor driver relation.
//!
//! An actor is in one of three driving states: *unowned* (no default
//! controller, nobody driving), *default-owned* (driven by its designated
//! default controller), or *overridden* (taken over by some other
//! controller). This module stores only the overrides: an absent entry means
//! the actor is driven by its default controller, so severing a link can
//! never leave a dangling reference - reverting to the default is just
//! removing the entry.
//!
//! Both sides of the relation hold ids, never references to each other; the
//! table's per-entry locking makes connect/disconnect atomic.

use crate::types::{ActorId, UserId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// Override table mapping an actor to the controller that has taken it over.
///
/// Owned by the [`Zone`](crate::Zone); callers normally go through the
/// zone's wrappers, which resolve the actor's default controller.
#[derive(Debug, Default)]
pub struct DriverTable {
    overrides: DashMap<ActorId, UserId>,
}

impl DriverTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a take-over of `actor` by `controller`.
    ///
    /// Succeeds only when no override exists (i.e. the current driver is the
    /// actor's own default controller). The check-and-set is atomic per
    /// entry; a racing second take-over loses.
    pub fn connect(&self, controller: UserId, actor: ActorId) -> bool {
        match self.overrides.entry(actor) {
            Entry::Vacant(slot) => {
                slot.insert(controller);
                debug!("🔗 {controller} took over {actor}");
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Releases `actor` if `controller` is its current (overriding) driver.
    ///
    /// Driving reverts to the actor's default controller. Disconnecting a
    /// controller that is not currently driving is a silent no-op.
    pub fn disconnect(&self, controller: UserId, actor: ActorId) -> bool {
        let removed = self
            .overrides
            .remove_if(&actor, |_, driver| *driver == controller)
            .is_some();
        if removed {
            debug!("🔗 {controller} released {actor}");
        }
        removed
    }

    /// The overriding driver of `actor`, if any.
    ///
    /// `None` means the actor is default-owned or unowned; the zone resolves
    /// which by consulting the actor record.
    pub fn override_of(&self, actor: ActorId) -> Option<UserId> {
        self.overrides.get(&actor).map(|entry| *entry.value())
    }

    /// Clears any override on a destroyed actor, returning the controller
    /// whose link was severed.
    pub fn clear_actor(&self, actor: ActorId) -> Option<UserId> {
        self.overrides.remove(&actor).map(|(_, driver)| driver)
    }

    /// Severs every link held by a departing controller, returning the
    /// actors whose driving reverted to their defaults.
    pub fn release_all(&self, controller: UserId) -> Vec<ActorId> {
        let held: Vec<ActorId> = self
            .overrides
            .iter()
            .filter(|entry| *entry.value() == controller)
            .map(|entry| *entry.key())
            .collect();
        for actor in &held {
            self.overrides
                .remove_if(actor, |_, driver| *driver == controller);
        }
        held
    }

    /// Number of live overrides.
    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    /// Whether no override is active.
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_takeover_loses() {
        let table = DriverTable::new();
        let actor = ActorId(10);
        assert!(table.connect(UserId(1), actor));
        assert!(!table.connect(UserId(2), actor));
        assert_eq!(table.override_of(actor), Some(UserId(1)));
    }

    #[test]
    fn disconnect_requires_current_driver() {
        let table = DriverTable::new();
        let actor = ActorId(10);
        table.connect(UserId(1), actor);
        assert!(!table.disconnect(UserId(2), actor), "non-driver disconnect is a no-op");
        assert_eq!(table.override_of(actor), Some(UserId(1)));
        assert!(table.disconnect(UserId(1), actor));
        assert_eq!(table.override_of(actor), None);
    }

    #[test]
    fn release_all_severs_every_link() {
        let table = DriverTable::new();
        table.connect(UserId(1), ActorId(10));
        table.connect(UserId(1), ActorId(11));
        table.connect(UserId(2), ActorId(12));
        let mut released = table.release_all(UserId(1));
        released.sort();
        assert_eq!(released, vec![ActorId(10), ActorId(11)]);
        assert_eq!(table.override_of(ActorId(12)), Some(UserId(2)));
        assert_eq!(table.len(), 1);
    }
}
