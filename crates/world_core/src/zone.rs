//! The zone: entity table plus a grid of per-sector octrees.
//!
//! A zone partitions the world into a coarse 3-D grid of sectors, each with
//! its own independently built [`Octree`]. The zone exclusively owns every
//! octree and the authoritative actor table; all shared mutation goes
//! through methods here, which acquire per-sector locks at the right
//! granularity so that cross-pool contention is scoped to a sector, never
//! the whole world.

use crate::actor::Actor;
use crate::control::DriverTable;
use crate::error::WorldError;
use crate::octree::{Octree, OctreeConfig};
use crate::types::{Aabb, ActorId, SectorCoords, UserId, Vec3};
use dashmap::DashMap;
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// Geometry of the zone's sector grid.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ZoneConfig {
    /// World position of the grid's minimum corner
    pub origin: Vec3,
    /// Dimensions of one sector
    pub sector_size: Vec3,
    /// Number of sectors along each axis
    pub sector_counts: [usize; 3],
    /// Subdivision bounds for every sector octree
    pub octree: OctreeConfig,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            origin: Vec3::zero(),
            sector_size: Vec3::new(256.0, 256.0, 256.0),
            sector_counts: [4, 4, 1],
            octree: OctreeConfig::default(),
        }
    }
}

impl ZoneConfig {
    fn sector_total(&self) -> usize {
        self.sector_counts[0] * self.sector_counts[1] * self.sector_counts[2]
    }
}

/// The shared world state: actors, sector octrees, and the driver relation.
///
/// The entity table and driver table are sharded maps with per-entry
/// atomicity; each sector octree sits behind its own `RwLock`, held in
/// shared mode for neighbor queries and exclusively across any
/// remove+reinsert that changes membership, so readers never observe a
/// half-updated tree.
#[derive(Debug)]
pub struct Zone {
    config: ZoneConfig,
    actors: DashMap<ActorId, Actor>,
    sectors: Vec<RwLock<Octree>>,
    drivers: DriverTable,
}

impl Zone {
    /// Creates an empty zone with one octree per configured sector.
    pub fn new(config: ZoneConfig) -> Self {
        let mut sectors = Vec::with_capacity(config.sector_total());
        for z in 0..config.sector_counts[2] {
            for y in 0..config.sector_counts[1] {
                for x in 0..config.sector_counts[0] {
                    let coords = SectorCoords::new(x, y, z);
                    let bounds = sector_bounds(&config, coords);
                    sectors.push(RwLock::new(Octree::new(bounds, config.octree)));
                }
            }
        }
        info!(
            "🌍 Zone initialized: {}x{}x{} sectors of {:?} units",
            config.sector_counts[0], config.sector_counts[1], config.sector_counts[2], config.sector_size
        );
        Self {
            config,
            actors: DashMap::new(),
            sectors,
            drivers: DriverTable::new(),
        }
    }

    /// The zone's grid configuration.
    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    /// Maps a world position to sector grid coordinates.
    ///
    /// Integer division of the offset from the grid origin by the per-sector
    /// dimensions; `None` for positions outside the grid.
    pub fn which_sector(&self, pos: Vec3) -> Option<SectorCoords> {
        let rel = pos - self.config.origin;
        if rel.x < 0.0 || rel.y < 0.0 || rel.z < 0.0 {
            return None;
        }
        let x = (rel.x / self.config.sector_size.x) as usize;
        let y = (rel.y / self.config.sector_size.y) as usize;
        let z = (rel.z / self.config.sector_size.z) as usize;
        let [nx, ny, nz] = self.config.sector_counts;
        if x >= nx || y >= ny || z >= nz {
            return None;
        }
        Some(SectorCoords::new(x, y, z))
    }

    /// The octree root for a sector grid cell.
    pub fn sector(&self, coords: SectorCoords) -> &RwLock<Octree> {
        &self.sectors[self.sector_index(coords)]
    }

    fn sector_index(&self, coords: SectorCoords) -> usize {
        let [nx, ny, _] = self.config.sector_counts;
        coords.x + coords.y * nx + coords.z * nx * ny
    }

    /// O(1) lookup returning a clone of the actor record.
    pub fn get_actor(&self, id: ActorId) -> Option<Actor> {
        self.actors.get(&id).map(|entry| entry.value().clone())
    }

    /// Runs `f` against the live actor record under the table's entry lock.
    pub fn with_actor_mut<R>(&self, id: ActorId, f: impl FnOnce(&mut Actor) -> R) -> Option<R> {
        self.actors.get_mut(&id).map(|mut entry| f(entry.value_mut()))
    }

    /// Whether an actor exists.
    pub fn contains_actor(&self, id: ActorId) -> bool {
        self.actors.contains_key(&id)
    }

    /// Number of actors in the entity table.
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Ids of every actor currently carrying velocity.
    pub fn moving_actor_ids(&self) -> Vec<ActorId> {
        self.actors
            .iter()
            .filter(|entry| entry.value().is_moving())
            .map(|entry| *entry.key())
            .collect()
    }

    /// Inserts a single actor into the table and its sector's octree.
    pub fn spawn(&self, mut actor: Actor) -> Result<(), WorldError> {
        let coords = self
            .which_sector(actor.position)
            .ok_or(WorldError::OutOfBounds(actor.position))?;
        actor.sector = Some(coords);
        {
            let mut octree = self
                .sector(coords)
                .write()
                .expect("sector lock poisoned");
            octree.insert(actor.id, actor.position);
        }
        debug!("✨ Spawned {} in sector {}", actor.id, coords);
        self.actors.insert(actor.id, actor);
        Ok(())
    }

    /// Removes an actor from the world.
    ///
    /// Unregisters it from its sector octree and severs any driver link.
    ///
    /// # Returns
    ///
    /// The controller that was driving the actor (override or default), so
    /// the session layer can clear its live reference; `None` if the actor
    /// was unknown or undriven.
    pub fn despawn(&self, id: ActorId) -> Option<UserId> {
        let (_, actor) = self.actors.remove(&id)?;
        if let Some(coords) = actor.sector {
            let mut octree = self
                .sector(coords)
                .write()
                .expect("sector lock poisoned");
            octree.remove(id, actor.position);
        }
        let severed = self.drivers.clear_actor(id).or(actor.default_controller);
        debug!("💨 Despawned {}", id);
        severed
    }

    /// Bulk-loads actors and rebuilds every sector octree from scratch.
    ///
    /// Used at world load; actors outside the grid are skipped with a
    /// warning rather than failing the whole load.
    pub fn load(&self, actors: Vec<Actor>) {
        let mut per_sector: Vec<Vec<(ActorId, Vec3)>> = vec![Vec::new(); self.sectors.len()];
        let mut loaded = 0usize;
        for mut actor in actors {
            let Some(coords) = self.which_sector(actor.position) else {
                warn!("Actor {} at {:?} is outside the sector grid, skipped", actor.id, actor.position);
                continue;
            };
            actor.sector = Some(coords);
            per_sector[self.sector_index(coords)].push((actor.id, actor.position));
            self.actors.insert(actor.id, actor);
            loaded += 1;
        }
        for (index, list) in per_sector.into_iter().enumerate() {
            let mut octree = self.sectors[index].write().expect("sector lock poisoned");
            octree.build(list);
        }
        info!("🌍 World loaded: {} actors across {} sectors", loaded, self.sectors.len());
    }

    /// Actors visible from `id`: the requesting actor plus every actor
    /// whose octree leaf is the same as or a neighbor of its own.
    ///
    /// Pure query under the sector's shared lock.
    pub fn nearby_actor_ids(&self, id: ActorId) -> Vec<ActorId> {
        let Some((pos, coords)) = self
            .actors
            .get(&id)
            .map(|a| (a.position, a.sector))
        else {
            return Vec::new();
        };
        let Some(coords) = coords.or_else(|| self.which_sector(pos)) else {
            return Vec::new();
        };
        let octree = self.sector(coords).read().expect("sector lock poisoned");
        octree.nearby_actors(pos)
    }

    /// Re-registers a moved actor in the octree grid.
    ///
    /// When the move crosses a sector boundary both sector locks are taken
    /// in index order (no lock-order inversion); within one sector a single
    /// write lock covers the whole remove+reinsert. The registration is then
    /// confirmed against the entity table: a despawn that raced the move
    /// takes the fresh registration back out, so the octree can never hold
    /// an id with no entity-table entry.
    ///
    /// # Returns
    ///
    /// `true` when the actor crossed a sector boundary, or
    /// [`WorldError::UnknownActor`] when the actor was despawned underneath
    /// the move.
    pub fn update_membership(
        &self,
        id: ActorId,
        old_pos: Vec3,
        new_pos: Vec3,
    ) -> Result<bool, WorldError> {
        let old_coords = self
            .which_sector(old_pos)
            .ok_or(WorldError::OutOfBounds(old_pos))?;
        let new_coords = self
            .which_sector(new_pos)
            .ok_or(WorldError::OutOfBounds(new_pos))?;

        if old_coords == new_coords {
            {
                let mut octree = self
                    .sector(old_coords)
                    .write()
                    .expect("sector lock poisoned");
                octree.remove(id, old_pos);
                octree.insert(id, new_pos);
            }
            self.confirm_registration(id, new_coords, new_pos)?;
            return Ok(false);
        }

        let old_index = self.sector_index(old_coords);
        let new_index = self.sector_index(new_coords);
        let (first, second) = if old_index < new_index {
            (old_index, new_index)
        } else {
            (new_index, old_index)
        };
        let first_guard = self.sectors[first].write().expect("sector lock poisoned");
        let second_guard = self.sectors[second].write().expect("sector lock poisoned");
        let (mut old_guard, mut new_guard) = if old_index < new_index {
            (first_guard, second_guard)
        } else {
            (second_guard, first_guard)
        };
        old_guard.remove(id, old_pos);
        new_guard.insert(id, new_pos);
        drop(old_guard);
        drop(new_guard);

        self.confirm_registration(id, new_coords, new_pos)?;
        debug!("🚪 {} crossed {} -> {}", id, old_coords, new_coords);
        Ok(true)
    }

    /// Stamps the actor's new sector, or rolls the fresh octree registration
    /// back if the entity entry disappeared while the move was in flight.
    ///
    /// Taken after the sector locks are released, never while holding one:
    /// entry-shard and sector locks must not nest (spawn takes them in the
    /// opposite order).
    fn confirm_registration(
        &self,
        id: ActorId,
        coords: SectorCoords,
        pos: Vec3,
    ) -> Result<(), WorldError> {
        if self
            .with_actor_mut(id, |actor| actor.sector = Some(coords))
            .is_some()
        {
            return Ok(());
        }
        let mut octree = self.sector(coords).write().expect("sector lock poisoned");
        octree.remove(id, pos);
        debug!("💨 {} despawned mid-move, registration rolled back", id);
        Err(WorldError::UnknownActor(id))
    }

    // ------------------------------------------------------------------
    // Driver relation wrappers (take-over protocol)
    // ------------------------------------------------------------------

    /// The controller currently driving `actor`: the override if one is
    /// active, otherwise the actor's default controller.
    pub fn driver_of(&self, actor: ActorId) -> Option<UserId> {
        self.drivers
            .override_of(actor)
            .or_else(|| self.actors.get(&actor).and_then(|a| a.default_controller))
    }

    /// Attempts to make `user` the driver of `actor`.
    ///
    /// Succeeds iff the actor's current driver is its own default controller
    /// - an actor already taken over by someone else cannot be taken again.
    /// A default controller re-connecting to its own actor is a success
    /// without recording an override.
    pub fn connect_driver(&self, user: UserId, actor: ActorId) -> bool {
        let Some(default) = self.actors.get(&actor).map(|a| a.default_controller) else {
            return false;
        };
        if default == Some(user) {
            // Reclaiming one's own actor succeeds unless someone else has
            // taken it over.
            return self.drivers.override_of(actor).is_none();
        }
        self.drivers.connect(user, actor)
    }

    /// Releases `actor` if `user` is its current driver; driving reverts to
    /// the default controller. No-op otherwise.
    pub fn disconnect_driver(&self, user: UserId, actor: ActorId) {
        self.drivers.disconnect(user, actor);
    }

    /// Severs every link held by a departing controller.
    pub fn release_driver(&self, user: UserId) -> Vec<ActorId> {
        self.drivers.release_all(user)
    }
}

fn sector_bounds(config: &ZoneConfig, coords: SectorCoords) -> Aabb {
    let min = Vec3::new(
        config.origin.x + coords.x as f64 * config.sector_size.x,
        config.origin.y + coords.y as f64 * config.sector_size.y,
        config.origin.z + coords.z as f64 * config.sector_size.z,
    );
    let max = min + config.sector_size;
    Aabb::new(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_zone() -> Zone {
        Zone::new(ZoneConfig {
            origin: Vec3::zero(),
            sector_size: Vec3::new(100.0, 100.0, 100.0),
            sector_counts: [2, 2, 1],
            octree: OctreeConfig {
                min_depth: 1,
                max_depth: 3,
                max_leaf_objects: 4,
            },
        })
    }

    #[test]
    fn which_sector_maps_positions_to_grid_cells() {
        let zone = test_zone();
        assert_eq!(zone.which_sector(Vec3::new(10.0, 10.0, 10.0)), Some(SectorCoords::new(0, 0, 0)));
        assert_eq!(zone.which_sector(Vec3::new(150.0, 10.0, 10.0)), Some(SectorCoords::new(1, 0, 0)));
        assert_eq!(zone.which_sector(Vec3::new(10.0, 199.0, 10.0)), Some(SectorCoords::new(0, 1, 0)));
        assert_eq!(zone.which_sector(Vec3::new(-1.0, 0.0, 0.0)), None);
        assert_eq!(zone.which_sector(Vec3::new(250.0, 0.0, 0.0)), None);
    }

    #[test]
    fn spawn_despawn_keeps_octree_membership_consistent() {
        let zone = test_zone();
        let actor = Actor::new(ActorId(1), Vec3::new(10.0, 10.0, 10.0));
        zone.spawn(actor).expect("spawn failed");
        assert!(zone.contains_actor(ActorId(1)));

        let coords = SectorCoords::new(0, 0, 0);
        {
            let octree = zone.sector(coords).read().unwrap();
            let leaf = octree.leaf_for(Vec3::new(10.0, 10.0, 10.0));
            assert!(octree.actors_at(leaf).contains(&ActorId(1)));
        }

        zone.despawn(ActorId(1));
        assert!(!zone.contains_actor(ActorId(1)));
        let octree = zone.sector(coords).read().unwrap();
        let total: usize = octree
            .node_indices()
            .iter()
            .map(|n| octree.actors_at(*n).len())
            .sum();
        assert_eq!(total, 0);
    }

    #[test]
    fn spawn_outside_grid_is_rejected() {
        let zone = test_zone();
        let actor = Actor::new(ActorId(1), Vec3::new(500.0, 0.0, 0.0));
        assert!(matches!(zone.spawn(actor), Err(WorldError::OutOfBounds(_))));
    }

    #[test]
    fn membership_update_across_sector_boundary() {
        let zone = test_zone();
        let old_pos = Vec3::new(99.0, 50.0, 50.0);
        let new_pos = Vec3::new(101.0, 50.0, 50.0);
        zone.spawn(Actor::new(ActorId(1), old_pos)).unwrap();

        let crossed = zone.update_membership(ActorId(1), old_pos, new_pos).unwrap();
        assert!(crossed);
        assert_eq!(
            zone.get_actor(ActorId(1)).unwrap().sector,
            Some(SectorCoords::new(1, 0, 0))
        );
        let old_octree = zone.sector(SectorCoords::new(0, 0, 0)).read().unwrap();
        let remaining: usize = old_octree
            .node_indices()
            .iter()
            .map(|n| old_octree.actors_at(*n).len())
            .sum();
        assert_eq!(remaining, 0, "actor left behind in old sector");
        let new_octree = zone.sector(SectorCoords::new(1, 0, 0)).read().unwrap();
        let leaf = new_octree.leaf_for(new_pos);
        assert!(new_octree.actors_at(leaf).contains(&ActorId(1)));
    }

    #[test]
    fn membership_update_after_despawn_leaves_no_ghost_registration() {
        let zone = test_zone();
        let old_pos = Vec3::new(10.0, 10.0, 10.0);
        zone.spawn(Actor::new(ActorId(1), old_pos)).unwrap();
        zone.despawn(ActorId(1));

        // Same-sector move racing the despawn: the insert is rolled back.
        let new_pos = Vec3::new(20.0, 10.0, 10.0);
        assert!(matches!(
            zone.update_membership(ActorId(1), old_pos, new_pos),
            Err(WorldError::UnknownActor(_))
        ));
        let octree = zone.sector(SectorCoords::new(0, 0, 0)).read().unwrap();
        let total: usize = octree
            .node_indices()
            .iter()
            .map(|n| octree.actors_at(*n).len())
            .sum();
        assert_eq!(total, 0, "ghost registration survived the despawn");
        drop(octree);

        // Cross-sector variant: the new sector must stay clean too.
        let far_pos = Vec3::new(150.0, 10.0, 10.0);
        assert!(matches!(
            zone.update_membership(ActorId(1), old_pos, far_pos),
            Err(WorldError::UnknownActor(_))
        ));
        let octree = zone.sector(SectorCoords::new(1, 0, 0)).read().unwrap();
        let total: usize = octree
            .node_indices()
            .iter()
            .map(|n| octree.actors_at(*n).len())
            .sum();
        assert_eq!(total, 0, "ghost registration survived the despawn");
    }

    #[test]
    fn takeover_exclusivity_state_machine() {
        let zone = test_zone();
        let default = UserId(100);
        let actor = Actor::new(ActorId(1), Vec3::new(10.0, 10.0, 10.0))
            .with_default_controller(default);
        zone.spawn(actor).unwrap();

        // Default-owned at rest.
        assert_eq!(zone.driver_of(ActorId(1)), Some(default));

        // C1 takes over while the default controller is driving.
        assert!(zone.connect_driver(UserId(1), ActorId(1)));
        assert_eq!(zone.driver_of(ActorId(1)), Some(UserId(1)));

        // C2 cannot take over an overridden actor; C1 remains the driver.
        assert!(!zone.connect_driver(UserId(2), ActorId(1)));
        assert_eq!(zone.driver_of(ActorId(1)), Some(UserId(1)));

        // The default controller cannot reclaim while overridden either.
        assert!(!zone.connect_driver(default, ActorId(1)));

        // A non-driver disconnect is a silent no-op.
        zone.disconnect_driver(UserId(2), ActorId(1));
        assert_eq!(zone.driver_of(ActorId(1)), Some(UserId(1)));

        // Disconnecting the real driver reverts to the default controller.
        zone.disconnect_driver(UserId(1), ActorId(1));
        assert_eq!(zone.driver_of(ActorId(1)), Some(default));

        // And the default controller can now reconnect to its own actor.
        assert!(zone.connect_driver(default, ActorId(1)));
        assert_eq!(zone.driver_of(ActorId(1)), Some(default));
    }

    #[test]
    fn despawn_reports_the_severed_driver() {
        let zone = test_zone();
        let actor = Actor::new(ActorId(1), Vec3::new(10.0, 10.0, 10.0))
            .with_default_controller(UserId(100));
        zone.spawn(actor).unwrap();
        zone.connect_driver(UserId(7), ActorId(1));

        assert_eq!(zone.despawn(ActorId(1)), Some(UserId(7)));
        assert_eq!(zone.despawn(ActorId(1)), None, "double despawn is inert");
    }
}
