//! # Core Type Definitions
//!
//! Fundamental types shared across the world state and the pipeline stages:
//! entity and user identifiers, the 3-D vector type, axis-aligned bounding
//! boxes and sector grid coordinates.
//!
//! ## Design Principles
//!
//! - **Type Safety**: wrapper types prevent ID confusion (ActorId vs UserId)
//! - **Precision**: double-precision floats for large-world positioning
//! - **Serialization**: identifiers and vectors support serde for config and
//!   wire-adjacent tooling

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Sub};

/// Unique 64-bit identifier for an actor in the game world.
///
/// Actor ids are assigned by the persistence collaborator when the world is
/// loaded or an entity is spawned; the core never invents them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "actor:{}", self.0)
    }
}

/// Unique 64-bit identifier for an authenticated user.
///
/// Zero is reserved by the authentication collaborator to mean "rejected",
/// so a valid `UserId` is always nonzero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// Identifier of a registered skill/action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkillId(pub u32);

impl std::fmt::Display for SkillId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "skill:{}", self.0)
    }
}

/// Represents a 3D vector in the game world.
///
/// Uses double-precision floating point for accuracy in large worlds. Used
/// for positions, velocities and Euler-angle orientations alike.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X coordinate (typically east-west axis)
    pub x: f64,
    /// Y coordinate (typically north-south axis)
    pub y: f64,
    /// Z coordinate (typically vertical axis)
    pub z: f64,
}

impl Vec3 {
    /// Creates a new vector with the specified components.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates a zero vector (0, 0, 0).
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Returns true when every component is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    /// Calculates the Euclidean distance to another vector.
    pub fn distance(&self, other: Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Axis-aligned bounding box defined by its two extreme corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Creates a bounding box from its extreme corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Geometric center of the box.
    pub fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
            (self.min.z + self.max.z) * 0.5,
        )
    }

    /// Whether a point falls inside the box (min-inclusive, max-exclusive).
    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x < self.max.x
            && p.y >= self.min.y
            && p.y < self.max.y
            && p.z >= self.min.z
            && p.z < self.max.z
    }
}

/// Integer grid coordinates of one sector in the zone's coarse grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectorCoords {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl SectorCoords {
    pub fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }
}

impl std::fmt::Display for SectorCoords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec3_arithmetic() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(0.5, -1.0, 2.0);
        assert_eq!(a + b, Vec3::new(1.5, 1.0, 5.0));
        assert_eq!(a - b, Vec3::new(0.5, 3.0, 1.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
        assert!(Vec3::zero().is_zero());
        assert!(!a.is_zero());
    }

    #[test]
    fn aabb_containment_is_min_inclusive() {
        let b = Aabb::new(Vec3::zero(), Vec3::new(10.0, 10.0, 10.0));
        assert!(b.contains(Vec3::zero()));
        assert!(b.contains(Vec3::new(9.999, 5.0, 0.0)));
        assert!(!b.contains(Vec3::new(10.0, 5.0, 0.0)));
        assert_eq!(b.center(), Vec3::new(5.0, 5.0, 5.0));
    }
}
