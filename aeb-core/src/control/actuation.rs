// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Metrics and ego command derivation

use crate::link::{InboundDecision, OutboundTelemetry};
use crate::scenario::ScenarioParams;
use crate::world::KinematicSample;
#[cfg(feature = "recording")]
use postcard::experimental::max_size::MaxSize;
#[cfg(feature = "recording")]
use serde::{Deserialize, Serialize};

/// Vehicle control command
#[cfg_attr(feature = "recording", derive(Serialize, Deserialize, MaxSize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActuationCommand {
    /// Within [0, 1]
    pub throttle: f64,
    /// Within [0, 1]
    pub brake: f64,
    /// Within [-1, 1]
    pub steer: f64,
}

impl ActuationCommand {
    pub const FULL_BRAKE: ActuationCommand = ActuationCommand {
        throttle: 0.0,
        brake: 1.0,
        steer: 0.0,
    };

    /// Copy with every component clamped into its valid range. NaN becomes 0.
    pub fn clamped(&self) -> ActuationCommand {
        fn clamp(value: f64, min: f64) -> f64 {
            if value.is_nan() {
                0.0
            } else {
                value.clamp(min, 1.0)
            }
        }
        ActuationCommand {
            throttle: clamp(self.throttle, 0.0),
            brake: clamp(self.brake, 0.0),
            steer: clamp(self.steer, -1.0),
        }
    }
}

/// Time to collision in seconds, infinite unless the gap is closing
pub fn time_to_collision(distance: f64, relative_velocity: f64) -> f64 {
    if relative_velocity > 0.0 {
        distance / relative_velocity
    } else {
        f64::INFINITY
    }
}

/// Per-tick measurements of the actor pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub distance: f64,
    pub ego_speed: f64,
    pub other_speed: f64,
    /// Ego speed minus cyclist speed
    pub relative_velocity: f64,
    pub ttc: f64,
}

impl Metrics {
    pub fn from_samples(ego: &KinematicSample, other: &KinematicSample) -> Self {
        let distance = ego.position.distance(&other.position);
        let ego_speed = ego.speed();
        let other_speed = other.speed();
        let relative_velocity = ego_speed - other_speed;
        Self {
            distance,
            ego_speed,
            other_speed,
            relative_velocity,
            ttc: time_to_collision(distance, relative_velocity),
        }
    }

    /// The part of the measurements sent to the decision process
    pub fn outbound(&self) -> OutboundTelemetry {
        OutboundTelemetry {
            distance: self.distance,
            other_speed: self.other_speed,
            ego_speed: self.ego_speed,
        }
    }
}

/// Ego command for the current tick
///
/// An emergency (AEB, stop request or latched collision) always brakes fully. Before the
/// engagement time the ego vehicle is held. Afterwards the requested deceleration is
/// applied as brake while the throttle is reduced by the same amount, down to a floor.
pub fn derive_command(
    params: &ScenarioParams,
    decision: &InboundDecision,
    sim_time: f64,
    collision: bool,
) -> ActuationCommand {
    if decision.aeb_active || decision.stop_ego || collision {
        ActuationCommand::FULL_BRAKE
    } else if sim_time > params.engagement_time {
        ActuationCommand {
            throttle: params
                .floor_throttle
                .max(params.nominal_throttle - decision.deceleration),
            brake: decision.deceleration,
            steer: 0.0,
        }
        .clamped()
    } else {
        ActuationCommand::FULL_BRAKE
    }
}
