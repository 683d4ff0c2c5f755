// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Scenario driver for AEB (autonomous emergency braking) tests against a cyclist.
//!
//! # Control loop
//!
//! The [control loop](crate::control::ControlLoop) advances a [world](crate::world::World)
//! in fixed steps. Per step it measures distance and speeds of the ego vehicle and the
//! cyclist, exchanges one message pair with an external decision process and applies the
//! resulting brake and throttle command to the ego vehicle.
//!
//! # Decision link
//!
//! The external decision process connects once over TCP. Telemetry and decisions are
//! fixed-width records of 8 byte floats, see [link::codec]. Link faults never stop the
//! simulation: the loop falls back to the last known decision and keeps stepping.
//!
//! # Telemetry
//!
//! Every step is recorded into a bounded [history](crate::telemetry::TelemetryHistory)
//! which feeds the HUD and, with the `recording` feature, a recording file.

pub mod configuration;
pub mod control;
pub mod error;
pub mod link;
pub mod quit;
pub mod scenario;
pub mod telemetry;
pub mod world;

/// Re-export the public API
pub mod prelude {
    pub use crate::configuration::{Builder, LinkConfig, RunConfig};
    pub use crate::control::{ActuationCommand, ControlLoop, LoopState, RunSummary, TickReport};
    pub use crate::error::{Error, LinkError, NoPeer, WorldError};
    pub use crate::link::{Connection, Exchange, InboundDecision, Listener, OutboundTelemetry};
    pub use crate::quit::QuitSignal;
    pub use crate::scenario::{ScenarioActors, ScenarioParams};
    pub use crate::telemetry::{TelemetryHistory, TelemetrySink};
    pub use crate::world::{ActorId, World};
}
