// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Car-to-bicyclist scenario: constants, cyclist policy and actor setup

use crate::control::ActuationCommand;
use crate::error::WorldError;
use crate::link::InboundDecision;
use crate::world::{ActorId, Dynamics, KinematicWorld, Rotation, Transform, Vec3, World};
use log::info;

/// Blueprint of the ego vehicle
pub const EGO_BLUEPRINT: &str = "vehicle.audi.tt";

/// Blueprint of the cyclist
pub const CYCLIST_BLUEPRINT: &str = "vehicle.bh.crossbike";

/// Actors removed before spawning and at teardown
pub const VEHICLE_FILTER: &str = "vehicle.*";

/// Ego spawn point, heading towards the cyclist
pub const EGO_SPAWN: Transform =
    Transform::new(Vec3::new(8.0, -80.0, 0.3), Rotation::new(0.0, 90.0, 0.0));

/// Cyclist spawn point, 40 m ahead of the ego vehicle and oncoming at a slight angle
pub const CYCLIST_SPAWN: Transform =
    Transform::new(Vec3::new(8.0, -40.0, 0.3), Rotation::new(0.0, -86.0, 0.0));

/// Decision assumed while no valid decision has been received
pub const SAFE_DECISION: InboundDecision = InboundDecision {
    stop_ego: false,
    fcw_active: false,
    deceleration: 0.0,
    aeb_active: false,
};

/// Tunable constants of the scenario
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioParams {
    /// The cyclist is held until this simulation time in seconds
    pub cyclist_start: f64,
    /// Cyclist throttle once released
    pub cyclist_throttle: f64,
    /// The ego vehicle is held until this simulation time in seconds
    pub engagement_time: f64,
    /// Ego throttle without requested deceleration
    pub nominal_throttle: f64,
    /// Ego throttle never drops below this while driving
    pub floor_throttle: f64,
    /// Distance below which a collision is latched
    pub collision_distance: f64,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            cyclist_start: 2.0,
            cyclist_throttle: 0.4,
            engagement_time: 2.5,
            nominal_throttle: 0.5,
            floor_throttle: 0.3,
            collision_distance: 2.5,
        }
    }
}

/// Cyclist command at simulation time `sim_time`: full brake, then constant throttle
pub fn cyclist_command(params: &ScenarioParams, sim_time: f64) -> ActuationCommand {
    if sim_time > params.cyclist_start {
        ActuationCommand {
            throttle: params.cyclist_throttle,
            brake: 0.0,
            steer: 0.0,
        }
    } else {
        ActuationCommand::FULL_BRAKE
    }
}

/// The two actors of the scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioActors {
    pub ego: ActorId,
    pub cyclist: ActorId,
}

impl ScenarioActors {
    /// Clear all vehicles and spawn ego and cyclist in the built-in world
    pub fn spawn_kinematic(world: &mut KinematicWorld) -> Result<Self, WorldError> {
        clear_vehicles(world)?;
        let ego = world.spawn(EGO_BLUEPRINT, EGO_SPAWN, Dynamics::CAR)?;
        let cyclist = world.spawn(CYCLIST_BLUEPRINT, CYCLIST_SPAWN, Dynamics::BICYCLE)?;
        info!("Spawned ego {ego} and cyclist {cyclist}");
        Ok(Self { ego, cyclist })
    }
}

/// Destroy every actor matching [VEHICLE_FILTER], returning the number removed
pub fn clear_vehicles(world: &mut impl World) -> Result<usize, WorldError> {
    let vehicles = world.actors(VEHICLE_FILTER);
    for actor in &vehicles {
        world.destroy(*actor)?;
    }
    Ok(vehicles.len())
}
