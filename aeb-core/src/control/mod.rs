// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Fixed-step control loop

mod actuation;
mod pacing;
mod state;

pub use actuation::{derive_command, time_to_collision, ActuationCommand, Metrics};
pub use pacing::Pacer;
pub use state::{CollisionLatch, DecisionSource, LinkStats, LoopState, ScenarioState};

use crate::configuration::RunConfig;
use crate::error::{Error, LinkError, WorldError};
use crate::link::{Exchange, InboundDecision};
use crate::quit::QuitSignal;
use crate::scenario::{cyclist_command, ScenarioActors, ScenarioParams, VEHICLE_FILTER};
use crate::telemetry::{Frame, TelemetrySink};
use crate::world::World;
use log::{debug, error, info, trace, warn};
use std::time::Duration;

/// Tolerance when comparing the simulation time against the maximum duration
const DURATION_EPSILON: f64 = 1e-9;

/// Outcome of a single tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub sim_time: f64,
    pub metrics: Metrics,
    /// Decision the command was derived from
    pub decision: InboundDecision,
    pub source: DecisionSource,
    pub command: ActuationCommand,
    pub collision: bool,
    /// Loop state at the end of the tick
    pub state: LoopState,
    /// Link fault absorbed in this tick
    pub link_error: Option<LinkError>,
}

/// Outcome of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub sim_time: f64,
    pub collision_at: Option<f64>,
    pub state: LoopState,
    pub link: LinkStats,
    pub overruns: u64,
}

/// Control loop driving the scenario in a world `W` with decisions from a link `L`
///
/// Per tick, in this order: advance the world, command the cyclist, measure, exchange
/// telemetry and decision, latch a collision, command the ego vehicle, record telemetry
/// and frame the camera. World failures are fatal, link failures fall back to the last
/// known decision.
pub struct ControlLoop<W: World, L: Exchange> {
    world: W,
    link: Option<L>,
    actors: ScenarioActors,
    params: ScenarioParams,
    fixed_step: f64,
    max_duration: Option<f64>,
    pacer: Pacer,
    telemetry: TelemetrySink,
    quit: QuitSignal,
    state: ScenarioState,
}

impl<W: World, L: Exchange> ControlLoop<W, L> {
    /// Create a control loop. Without a link, the loop runs degraded from the first tick.
    pub fn new(
        world: W,
        actors: ScenarioActors,
        link: Option<L>,
        config: &RunConfig,
        telemetry: TelemetrySink,
        quit: QuitSignal,
    ) -> Self {
        let cycle_time = Duration::from_secs_f64(config.fixed_step);
        Self {
            world,
            link,
            actors,
            params: config.scenario,
            fixed_step: config.fixed_step,
            max_duration: config.max_duration,
            pacer: Pacer::new(cycle_time, config.realtime),
            telemetry,
            quit,
            state: ScenarioState::new(),
        }
    }

    pub fn state(&self) -> &ScenarioState {
        &self.state
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn telemetry(&self) -> &TelemetrySink {
        &self.telemetry
    }

    /// Run until quit is requested or the maximum duration is reached
    ///
    /// Returns an error if a world operation failed. The loop is stopped in either case and
    /// [ControlLoop::shutdown] should follow.
    pub fn run(&mut self) -> Result<RunSummary, Error> {
        info!(
            "Starting control loop, step {}s, maximum duration {:?}",
            self.fixed_step, self.max_duration
        );

        loop {
            if self.quit.is_requested() {
                info!("Quit requested");
                break;
            }
            if self.duration_reached() {
                info!("Reached maximum duration of {:.2}s", self.state.sim_time);
                break;
            }

            self.pacer.start_tick();
            self.step()?;
            self.pacer.finish_tick();
        }

        self.state.transition(LoopState::Stopping);
        Ok(self.summary())
    }

    /// Execute a single tick
    pub fn step(&mut self) -> Result<TickReport, Error> {
        match self.state.state() {
            LoopState::Initializing => self.start(),
            LoopState::Stopping => return Err(Error::Stopped),
            LoopState::Running | LoopState::Degraded => {}
        }

        let tick = self.state.tick + 1;
        let sim_time = tick as f64 * self.fixed_step;

        // Advance the world
        let ticked = self.world.tick(self.fixed_step);
        self.fatal(ticked)?;
        self.state.tick = tick;
        self.state.sim_time = sim_time;
        aeb_logger::set_sim_time(sim_time);
        trace!("Tick {tick}");

        // Scenario policy on the cyclist
        let cyclist = cyclist_command(&self.params, sim_time);
        let applied = self.world.apply_control(self.actors.cyclist, &cyclist);
        self.fatal(applied)?;

        // Measure
        let ego_sample = self.world.sample(self.actors.ego);
        let ego_sample = self.fatal(ego_sample)?;
        let cyclist_sample = self.world.sample(self.actors.cyclist);
        let cyclist_sample = self.fatal(cyclist_sample)?;
        let metrics = Metrics::from_samples(&ego_sample, &cyclist_sample);

        // Exchange with the decision process
        let link_error = self.exchange(&metrics);

        // Collision latch
        let collision = self.state.collision.update(
            metrics.distance,
            self.params.collision_distance,
            sim_time,
        );

        // Ego command
        let decision = self.state.decision();
        let command = derive_command(&self.params, &decision, sim_time, collision);
        let applied = self.world.apply_control(self.actors.ego, &command);
        self.fatal(applied)?;

        let frame = Frame {
            tick,
            sim_time,
            metrics,
            decision,
            source: self.state.source(),
            command,
            collision,
            state: self.state.state(),
        };
        self.telemetry.record(&frame);

        self.frame_camera();

        Ok(TickReport {
            tick,
            sim_time,
            metrics,
            decision,
            source: frame.source,
            command,
            collision,
            state: frame.state,
            link_error,
        })
    }

    /// Tear down: close the link, destroy all vehicles, release telemetry observers
    ///
    /// Every step is attempted even if an earlier one failed.
    pub fn shutdown(mut self) -> RunSummary {
        self.state.transition(LoopState::Stopping);

        if let Some(mut link) = self.link.take() {
            match link.close() {
                Ok(()) => debug!("Closed decision link"),
                Err(e) => error!("Failed to close decision link: {e}"),
            }
        }

        let vehicles = self.world.actors(VEHICLE_FILTER);
        let mut destroyed = 0;
        for actor in vehicles {
            match self.world.destroy(actor) {
                Ok(()) => destroyed += 1,
                Err(e) => error!("Failed to destroy {actor}: {e}"),
            }
        }
        info!("Destroyed {destroyed} vehicles");

        self.telemetry.close();

        let summary = self.summary();
        aeb_logger::clear_sim_time();
        summary
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            ticks: self.state.tick,
            sim_time: self.state.sim_time,
            collision_at: self.state.collision.collided_at(),
            state: self.state.state(),
            link: self.state.stats,
            overruns: self.pacer.overruns(),
        }
    }

    fn start(&mut self) {
        if self.link.is_some() {
            self.state.transition(LoopState::Running);
        } else {
            warn!("No decision process connected, running with default decisions");
            self.state.transition(LoopState::Degraded);
        }
    }

    fn duration_reached(&self) -> bool {
        self.max_duration
            .is_some_and(|max| self.state.sim_time + DURATION_EPSILON >= max)
    }

    /// One send/receive round, or the fallback decision if the link is unavailable
    fn exchange(&mut self, metrics: &Metrics) -> Option<LinkError> {
        let link = match self.link.as_mut() {
            Some(link) if self.state.state() == LoopState::Running => link,
            _ => {
                self.state.skip();
                return None;
            }
        };

        let telemetry = metrics.outbound();
        debug!("Sending {telemetry:?}");
        match link.exchange(&telemetry) {
            Ok(decision) => {
                debug!("Received {decision:?}");
                self.state.accept(decision);
                None
            }
            Err(e) => {
                self.state.fall_back(&e);
                if e.is_broken() {
                    self.state.transition(LoopState::Degraded);
                }
                Some(e)
            }
        }
    }

    /// Follow the ego vehicle with the spectator camera. Failures are ignored.
    fn frame_camera(&mut self) {
        let framed = self
            .world
            .transform(self.actors.ego)
            .and_then(|ego| self.world.set_spectator(&ego.chase_camera()));
        if let Err(e) = framed {
            trace!("Camera framing failed: {e}");
        }
    }

    /// Stop the loop on a world failure
    fn fatal<T>(&mut self, result: Result<T, WorldError>) -> Result<T, Error> {
        result.map_err(|e| {
            error!("World failure, stopping: {e}");
            self.state.transition(LoopState::Stopping);
            Error::World(e)
        })
    }
}
