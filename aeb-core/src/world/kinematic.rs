// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Built-in world with point-mass longitudinal dynamics
//!
//! Every actor moves along its fixed yaw heading. Throttle accelerates, brake and drag
//! decelerate, speed never becomes negative. There is no collision physics, actors pass
//! through each other.

use crate::control::ActuationCommand;
use crate::error::WorldError;
use crate::world::{matches_filter, ActorId, Transform, Vec3, World};
use log::{debug, trace};
use std::collections::BTreeMap;

/// Longitudinal vehicle characteristics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dynamics {
    /// Acceleration at full throttle in m/s²
    pub max_accel: f64,
    /// Deceleration at full brake in m/s²
    pub max_decel: f64,
    /// Speed proportional drag in 1/s
    pub drag: f64,
    /// Speed limit in m/s
    pub max_speed: f64,
}

impl Dynamics {
    pub const CAR: Dynamics = Dynamics {
        max_accel: 3.5,
        max_decel: 8.0,
        drag: 0.05,
        max_speed: 50.0,
    };

    pub const BICYCLE: Dynamics = Dynamics {
        max_accel: 1.5,
        max_decel: 5.0,
        drag: 0.1,
        max_speed: 8.0,
    };

    /// Speed after `dt` seconds under `command`
    fn advance(&self, speed: f64, command: &ActuationCommand, dt: f64) -> f64 {
        let throttle = command.throttle.clamp(0.0, 1.0);
        let brake = command.brake.clamp(0.0, 1.0);
        let accel = throttle * self.max_accel - brake * self.max_decel - self.drag * speed;
        (speed + accel * dt).clamp(0.0, self.max_speed)
    }
}

#[derive(Debug)]
struct Actor {
    type_id: String,
    transform: Transform,
    speed: f64,
    control: ActuationCommand,
    dynamics: Dynamics,
}

impl Actor {
    fn velocity(&self) -> Vec3 {
        self.transform.rotation.heading().scale(self.speed)
    }
}

/// Self-contained world for running scenarios without an external simulator
#[derive(Debug, Default)]
pub struct KinematicWorld {
    actors: BTreeMap<ActorId, Actor>,
    next_id: u32,
    elapsed: f64,
    spectator: Option<Transform>,
}

impl KinematicWorld {
    /// Minimum distance between a new actor and existing ones
    const SPAWN_CLEARANCE: f64 = 1.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a stationary actor
    ///
    /// Fails if the spawn point is occupied by another actor.
    pub fn spawn(
        &mut self,
        type_id: &str,
        transform: Transform,
        dynamics: Dynamics,
    ) -> Result<ActorId, WorldError> {
        if let Some((blocking, _)) = self.actors.iter().find(|(_, actor)| {
            actor.transform.location.distance(&transform.location) < Self::SPAWN_CLEARANCE
        }) {
            return Err(WorldError::Spawn(format!(
                "{type_id} at {:?} collides with {blocking}",
                transform.location
            )));
        }

        self.next_id += 1;
        let id = ActorId::new(self.next_id);
        self.actors.insert(
            id,
            Actor {
                type_id: type_id.to_owned(),
                transform,
                speed: 0.0,
                control: ActuationCommand::default(),
                dynamics,
            },
        );
        debug!("Spawned {type_id} as {id}");
        Ok(id)
    }

    /// Type id an actor was spawned with
    pub fn type_id(&self, actor: ActorId) -> Result<&str, WorldError> {
        Ok(self.actor(actor)?.type_id.as_str())
    }

    /// Simulation time advanced so far
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Last pose given to [World::set_spectator]
    pub fn spectator(&self) -> Option<&Transform> {
        self.spectator.as_ref()
    }

    fn actor(&self, id: ActorId) -> Result<&Actor, WorldError> {
        self.actors.get(&id).ok_or(WorldError::UnknownActor(id))
    }
}

impl World for KinematicWorld {
    fn tick(&mut self, dt: f64) -> Result<(), WorldError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(WorldError::Tick(format!("invalid step {dt}")));
        }

        for actor in self.actors.values_mut() {
            let speed = actor.dynamics.advance(actor.speed, &actor.control, dt);
            // Trapezoidal integration of the travelled distance
            let travelled = 0.5 * (actor.speed + speed) * dt;
            let heading = actor.transform.rotation.heading();
            actor.transform.location = actor.transform.location + heading.scale(travelled);
            actor.speed = speed;
        }
        self.elapsed += dt;
        trace!("World advanced to {:.2}s", self.elapsed);
        Ok(())
    }

    fn position(&self, actor: ActorId) -> Result<Vec3, WorldError> {
        Ok(self.actor(actor)?.transform.location)
    }

    fn velocity(&self, actor: ActorId) -> Result<Vec3, WorldError> {
        Ok(self.actor(actor)?.velocity())
    }

    fn apply_control(
        &mut self,
        actor: ActorId,
        command: &ActuationCommand,
    ) -> Result<(), WorldError> {
        let actor = self
            .actors
            .get_mut(&actor)
            .ok_or(WorldError::UnknownActor(actor))?;
        actor.control = *command;
        Ok(())
    }

    fn actors(&self, filter: &str) -> Vec<ActorId> {
        self.actors
            .iter()
            .filter(|(_, actor)| matches_filter(&actor.type_id, filter))
            .map(|(id, _)| *id)
            .collect()
    }

    fn destroy(&mut self, actor: ActorId) -> Result<(), WorldError> {
        let removed = self
            .actors
            .remove(&actor)
            .ok_or(WorldError::UnknownActor(actor))?;
        debug!("Destroyed {} ({actor})", removed.type_id);
        Ok(())
    }

    fn transform(&self, actor: ActorId) -> Result<Transform, WorldError> {
        Ok(self.actor(actor)?.transform)
    }

    fn set_spectator(&mut self, transform: &Transform) -> Result<(), WorldError> {
        self.spectator = Some(*transform);
        Ok(())
    }
}
