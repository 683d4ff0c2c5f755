// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Interface to the simulated world

mod kinematic;

pub use kinematic::{Dynamics, KinematicWorld};

use crate::control::ActuationCommand;
use crate::error::WorldError;
use core::fmt::Display;
use core::ops::{Add, Sub};

/// Handle of an actor in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(u32);

impl ActorId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u32 {
        self.0
    }
}

impl Display for ActorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "A{}", self.0)
    }
}

impl From<u32> for ActorId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Position or velocity in world coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance to `other`
    pub fn distance(&self, other: &Vec3) -> f64 {
        (*self - *other).length()
    }

    pub fn scale(&self, factor: f64) -> Vec3 {
        Vec3::new(self.x * factor, self.y * factor, self.z * factor)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

/// Orientation in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotation {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl Rotation {
    pub const fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Unit vector of the yaw direction in the ground plane
    pub fn heading(&self) -> Vec3 {
        let yaw = self.yaw.to_radians();
        Vec3::new(yaw.cos(), yaw.sin(), 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub location: Vec3,
    pub rotation: Rotation,
}

impl Transform {
    /// Distance of the chase camera behind the followed actor
    pub const CHASE_BACK: f64 = 17.0;
    /// Height of the chase camera above the followed actor
    pub const CHASE_UP: f64 = 12.0;
    /// Downward tilt of the chase camera
    pub const CHASE_PITCH: f64 = -25.0;

    pub const fn new(location: Vec3, rotation: Rotation) -> Self {
        Self { location, rotation }
    }

    /// Camera pose looking at this transform from behind and above, with the same yaw
    pub fn chase_camera(&self) -> Transform {
        let behind = self.rotation.heading().scale(-Self::CHASE_BACK);
        let location = self.location + behind + Vec3::new(0.0, 0.0, Self::CHASE_UP);
        Transform::new(
            location,
            Rotation::new(Self::CHASE_PITCH, self.rotation.yaw, 0.0),
        )
    }
}

/// Position and velocity of an actor at the current tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KinematicSample {
    pub position: Vec3,
    pub velocity: Vec3,
}

impl KinematicSample {
    pub fn speed(&self) -> f64 {
        self.velocity.length()
    }
}

/// Match an actor type id against a filter where `*` matches any sequence of characters
pub fn matches_filter(type_id: &str, filter: &str) -> bool {
    let mut parts = filter.split('*');
    let Some(first) = parts.next() else {
        return type_id.is_empty();
    };
    let Some(mut rest) = type_id.strip_prefix(first) else {
        return false;
    };
    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        // No wildcard in the filter
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(index) => rest = &rest[index + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

/// Physics world driven by the control loop
///
/// Implementations advance the simulation in [World::tick] and answer queries for the
/// state after the latest tick.
pub trait World {
    /// Advance the world by one fixed step of `dt` seconds
    fn tick(&mut self, dt: f64) -> Result<(), WorldError>;

    fn position(&self, actor: ActorId) -> Result<Vec3, WorldError>;

    fn velocity(&self, actor: ActorId) -> Result<Vec3, WorldError>;

    /// Apply a control command, effective from the next tick
    fn apply_control(
        &mut self,
        actor: ActorId,
        command: &ActuationCommand,
    ) -> Result<(), WorldError>;

    /// List actors whose type id matches `filter`, see [matches_filter]
    fn actors(&self, filter: &str) -> Vec<ActorId>;

    fn destroy(&mut self, actor: ActorId) -> Result<(), WorldError>;

    /// Full pose of an actor. Worlds without orientation report the position only.
    fn transform(&self, actor: ActorId) -> Result<Transform, WorldError> {
        Ok(Transform::new(self.position(actor)?, Rotation::default()))
    }

    /// Move the spectator camera. Worlds without a viewer ignore this.
    fn set_spectator(&mut self, _transform: &Transform) -> Result<(), WorldError> {
        Ok(())
    }

    fn sample(&self, actor: ActorId) -> Result<KinematicSample, WorldError> {
        Ok(KinematicSample {
            position: self.position(actor)?,
            velocity: self.velocity(actor)?,
        })
    }
}
