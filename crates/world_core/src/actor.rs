//! Movable world entities.
//!
//! An [`Actor`] is anything with a position in the world: avatars, NPCs,
//! projectiles. Actors are created on world load or spawn events, destroyed
//! on despawn, and mutated continuously by the motion stage while they carry
//! nonzero velocity.

use crate::types::{ActorId, SectorCoords, UserId, Vec3};
use std::time::Instant;

/// Boolean "nature" flags of an actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActorFlags {
    /// Excluded from update broadcasts to other sessions
    pub invisible: bool,
    /// Cannot be targeted by actions
    pub non_interactive: bool,
}

/// A simulated entity with position and velocity in the world.
///
/// The `sector` field is a weak back-reference to the zone sector currently
/// containing the actor; the zone keeps it consistent whenever membership
/// changes. Orientation and rotation rate are Euler angles in radians.
#[derive(Debug, Clone)]
pub struct Actor {
    /// Unique 64-bit identifier
    pub id: ActorId,
    /// Current world position
    pub position: Vec3,
    /// Orientation as Euler angles
    pub rotation: Vec3,
    /// Movement velocity, world units per second
    pub movement: Vec3,
    /// Rotation velocity, radians per second
    pub rotation_rate: Vec3,
    /// Instant of the last motion integration
    pub last_update: Instant,
    /// Nature flags
    pub flags: ActorFlags,
    /// Sector currently containing this actor, if registered
    pub sector: Option<SectorCoords>,
    /// Controller that owns this actor by default (its avatar owner)
    pub default_controller: Option<UserId>,
}

impl Actor {
    /// Creates a stationary actor at the given position.
    pub fn new(id: ActorId, position: Vec3) -> Self {
        Self {
            id,
            position,
            rotation: Vec3::zero(),
            movement: Vec3::zero(),
            rotation_rate: Vec3::zero(),
            last_update: Instant::now(),
            flags: ActorFlags::default(),
            sector: None,
            default_controller: None,
        }
    }

    /// Sets the default controller, builder style.
    pub fn with_default_controller(mut self, user: UserId) -> Self {
        self.default_controller = Some(user);
        self
    }

    /// Sets the movement velocity, builder style.
    pub fn with_movement(mut self, movement: Vec3) -> Self {
        self.movement = movement;
        self
    }

    /// Whether the actor carries any nonzero movement or rotation velocity.
    ///
    /// A non-moving actor drops out of the motion stage's self-requeue loop
    /// until something pushes it again.
    pub fn is_moving(&self) -> bool {
        !self.movement.is_zero() || !self.rotation_rate.is_zero()
    }

    /// Integrates position and orientation over the wall time elapsed since
    /// the last update, and stamps the new update time.
    ///
    /// Elapsed time is taken as fractional seconds
    /// (`Duration::as_secs_f64`), seconds plus microseconds over 1e6.
    ///
    /// # Returns
    ///
    /// The elapsed interval in seconds that was integrated over.
    pub fn integrate(&mut self, now: Instant) -> f64 {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.position += self.movement * elapsed;
        self.rotation += self.rotation_rate * elapsed;
        self.last_update = now;
        elapsed
    }
}
