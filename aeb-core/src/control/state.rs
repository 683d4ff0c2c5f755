// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! State carried by the control loop from tick to tick

use crate::error::LinkError;
use crate::link::InboundDecision;
use crate::scenario::SAFE_DECISION;
use core::fmt::Display;
use log::{error, info, warn};
#[cfg(feature = "recording")]
use postcard::experimental::max_size::MaxSize;
#[cfg(feature = "recording")]
use serde::{Deserialize, Serialize};

/// Lifecycle of the control loop
///
/// ```text
/// Initializing --> Running --> Degraded --> Stopping
///       |             |                        ^
///       +-------------+------------------------+
/// ```
///
/// `Degraded` (decision link lost or never established) is kept for the rest of the run.
#[cfg_attr(feature = "recording", derive(Serialize, Deserialize, MaxSize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Initializing,
    Running,
    Degraded,
    Stopping,
}

impl LoopState {
    pub fn can_transition_to(&self, next: LoopState) -> bool {
        use LoopState::*;
        matches!(
            (self, next),
            (Initializing, Running)
                | (Initializing, Degraded)
                | (Initializing, Stopping)
                | (Running, Degraded)
                | (Running, Stopping)
                | (Degraded, Stopping)
        )
    }
}

impl Display for LoopState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            LoopState::Initializing => "initializing",
            LoopState::Running => "running",
            LoopState::Degraded => "degraded",
            LoopState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Origin of the decision used in a tick
#[cfg_attr(feature = "recording", derive(Serialize, Deserialize, MaxSize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    /// Received in this tick
    Live,
    /// Received in an earlier tick
    Stale,
    /// No decision received so far
    Default,
}

impl Display for DecisionSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            DecisionSource::Live => "live",
            DecisionSource::Stale => "stale",
            DecisionSource::Default => "default",
        };
        f.write_str(name)
    }
}

/// Collision flag that is never reset once set
#[derive(Debug, Clone, Copy, Default)]
pub struct CollisionLatch {
    collided_at: Option<f64>,
}

impl CollisionLatch {
    /// Latch if `distance` is below `threshold`. Returns the latched state.
    pub fn update(&mut self, distance: f64, threshold: f64, sim_time: f64) -> bool {
        if self.collided_at.is_none() && distance < threshold {
            error!("Collision detected at distance {distance:.2}");
            self.collided_at = Some(sim_time);
        }
        self.is_set()
    }

    pub fn is_set(&self) -> bool {
        self.collided_at.is_some()
    }

    /// Simulation time at which the latch was set
    pub fn collided_at(&self) -> Option<f64> {
        self.collided_at
    }
}

/// Counters of link exchange outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub live: u64,
    pub timeouts: u64,
    pub malformed: u64,
    pub broken: u64,
    /// Ticks without an exchange attempt
    pub skipped: u64,
}

/// Scenario state owned by the control loop
#[derive(Debug)]
pub struct ScenarioState {
    /// Number of completed ticks
    pub tick: u64,
    /// Simulation time of the current tick in seconds
    pub sim_time: f64,
    pub collision: CollisionLatch,
    last_decision: Option<InboundDecision>,
    source: DecisionSource,
    state: LoopState,
    pub stats: LinkStats,
}

impl Default for ScenarioState {
    fn default() -> Self {
        Self {
            tick: 0,
            sim_time: 0.0,
            collision: CollisionLatch::default(),
            last_decision: None,
            source: DecisionSource::Default,
            state: LoopState::Initializing,
            stats: LinkStats::default(),
        }
    }
}

impl ScenarioState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn source(&self) -> DecisionSource {
        self.source
    }

    /// Decision in effect: the last valid one received, or [SAFE_DECISION]
    pub fn decision(&self) -> InboundDecision {
        self.last_decision.unwrap_or(SAFE_DECISION)
    }

    /// Take a freshly received decision
    pub fn accept(&mut self, decision: InboundDecision) {
        self.last_decision = Some(decision);
        self.source = DecisionSource::Live;
        self.stats.live += 1;
    }

    /// Keep the previous decision after a failed exchange
    pub fn fall_back(&mut self, cause: &LinkError) {
        match cause {
            LinkError::Timeout => self.stats.timeouts += 1,
            LinkError::Malformed { .. } | LinkError::InvalidValue { .. } => {
                self.stats.malformed += 1
            }
            LinkError::Broken(_) => self.stats.broken += 1,
        }
        self.retain();
        warn!(
            "Decision exchange failed ({cause}), using {} decision",
            self.source
        );
    }

    /// Keep the previous decision without an exchange attempt
    pub fn skip(&mut self) {
        self.stats.skipped += 1;
        self.retain();
    }

    fn retain(&mut self) {
        self.source = if self.last_decision.is_some() {
            DecisionSource::Stale
        } else {
            DecisionSource::Default
        };
    }

    /// Move to `next`. Illegal transitions are refused and reported.
    pub fn transition(&mut self, next: LoopState) -> bool {
        if self.state == next {
            return true;
        }
        if !self.state.can_transition_to(next) {
            warn!("Refusing transition from {} to {next}", self.state);
            return false;
        }
        info!("Control loop {} -> {next}", self.state);
        self.state = next;
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::ErrorKind;

    fn decision(deceleration: f64) -> InboundDecision {
        InboundDecision {
            deceleration,
            ..SAFE_DECISION
        }
    }

    #[test]
    fn latch_is_monotonic() {
        let mut latch = CollisionLatch::default();
        assert!(!latch.update(10.0, 2.5, 0.05));
        assert!(!latch.update(2.5, 2.5, 0.10));
        assert!(latch.update(2.4, 2.5, 0.15));
        assert!(latch.update(30.0, 2.5, 0.20));
        assert!(latch.update(f64::NAN, 2.5, 0.25));
        assert_eq!(latch.collided_at(), Some(0.15));
    }

    #[test]
    fn fallback_without_prior_decision_is_safe() {
        let mut state = ScenarioState::new();
        state.fall_back(&LinkError::Timeout);
        assert_eq!(state.decision(), SAFE_DECISION);
        assert_eq!(state.source(), DecisionSource::Default);
        assert_eq!(state.stats.timeouts, 1);
    }

    #[test]
    fn fallback_retains_last_decision() {
        let mut state = ScenarioState::new();
        state.accept(decision(0.3));
        assert_eq!(state.source(), DecisionSource::Live);
        state.fall_back(&LinkError::Malformed {
            received: 12,
            expected: 32,
        });
        assert_eq!(state.decision(), decision(0.3));
        assert_eq!(state.source(), DecisionSource::Stale);
        state.fall_back(&LinkError::InvalidValue { field: 2 });
        state.fall_back(&LinkError::Broken(ErrorKind::ConnectionReset));
        state.skip();
        assert_eq!(state.decision(), decision(0.3));
        assert_eq!(
            state.stats,
            LinkStats {
                live: 1,
                timeouts: 0,
                malformed: 2,
                broken: 1,
                skipped: 1,
            }
        );
    }

    #[test]
    fn degraded_is_terminal_until_stop() {
        let mut state = ScenarioState::new();
        assert!(state.transition(LoopState::Running));
        assert!(state.transition(LoopState::Degraded));
        assert!(!state.transition(LoopState::Running));
        assert_eq!(state.state(), LoopState::Degraded);
        assert!(state.transition(LoopState::Stopping));
        assert!(!state.transition(LoopState::Degraded));
        assert_eq!(state.state(), LoopState::Stopping);
    }

    #[test]
    fn display_names() {
        assert_eq!(LoopState::Degraded.to_string(), "degraded");
        assert_eq!(DecisionSource::Stale.to_string(), "stale");
    }
}
