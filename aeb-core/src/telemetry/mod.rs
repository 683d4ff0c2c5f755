// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Telemetry recording and display observers

mod history;
mod hud;
#[cfg(feature = "recording")]
pub mod recorder;

pub use history::{
    RingBuffer, TelemetryHistory, TelemetrySample, TelemetrySnapshot, PLOT_TTC_CAP,
};
pub use hud::Hud;

use crate::control::{ActuationCommand, DecisionSource, LoopState, Metrics};
use crate::link::InboundDecision;
use log::{debug, error, warn};
use std::io;

/// Everything known about one completed tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub tick: u64,
    pub sim_time: f64,
    pub metrics: Metrics,
    pub decision: InboundDecision,
    pub source: DecisionSource,
    pub command: ActuationCommand,
    pub collision: bool,
    pub state: LoopState,
}

impl Frame {
    pub fn sample(&self) -> TelemetrySample {
        TelemetrySample {
            time: self.sim_time,
            distance: self.metrics.distance,
            ttc: self.metrics.ttc,
            ego_speed: self.metrics.ego_speed,
            other_speed: self.metrics.other_speed,
        }
    }
}

/// Consumer of telemetry, e.g. a display or a recording
///
/// Observers must not block for long, they are called from the control loop.
pub trait Observer {
    fn name(&self) -> &str;

    /// Called every this many recorded samples
    fn refresh_interval(&self) -> u64 {
        1
    }

    fn update(&mut self, frame: &Frame, history: &TelemetryHistory) -> io::Result<()>;

    /// Release resources, e.g. flush buffered output
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Slot {
    observer: Box<dyn Observer>,
    enabled: bool,
}

/// Owner of the telemetry history, forwarding each tick to its observers
///
/// A failing observer is disabled for the rest of the run; the failure never reaches the
/// control loop.
pub struct TelemetrySink {
    history: TelemetryHistory,
    slots: Vec<Slot>,
}

impl TelemetrySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: TelemetryHistory::new(capacity),
            slots: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn Observer>) {
        debug!("Adding telemetry observer {}", observer.name());
        self.slots.push(Slot {
            observer,
            enabled: true,
        });
    }

    /// Append the frame's sample to the history and notify observers due for a refresh
    pub fn record(&mut self, frame: &Frame) {
        self.history.record(frame.sample());
        let recorded = self.history.recorded();

        for slot in self.slots.iter_mut().filter(|slot| slot.enabled) {
            let interval = slot.observer.refresh_interval().max(1);
            if recorded % interval != 0 {
                continue;
            }
            if let Err(e) = slot.observer.update(frame, &self.history) {
                warn!(
                    "Disabling telemetry observer {} after failure: {e}",
                    slot.observer.name()
                );
                slot.enabled = false;
            }
        }
    }

    pub fn history(&self) -> &TelemetryHistory {
        &self.history
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.history.snapshot()
    }

    /// Names of the observers still receiving updates
    pub fn active_observers(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|slot| slot.enabled)
            .map(|slot| slot.observer.name())
            .collect()
    }

    /// Close all observers, reporting failures without stopping
    pub fn close(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Err(e) = slot.observer.close() {
                error!(
                    "Failed to close telemetry observer {}: {e}",
                    slot.observer.name()
                );
            }
            slot.enabled = false;
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::scenario::SAFE_DECISION;
    use std::cell::RefCell;
    use std::rc::Rc;

    pub(crate) fn frame(tick: u64, distance: f64) -> Frame {
        Frame {
            tick,
            sim_time: tick as f64 * 0.05,
            metrics: Metrics {
                distance,
                ego_speed: 5.0,
                other_speed: 1.0,
                relative_velocity: 4.0,
                ttc: distance / 4.0,
            },
            decision: SAFE_DECISION,
            source: DecisionSource::Default,
            command: ActuationCommand::FULL_BRAKE,
            collision: false,
            state: LoopState::Running,
        }
    }

    struct Probe {
        interval: u64,
        fail_at: Option<u64>,
        seen: Rc<RefCell<Vec<u64>>>,
        closed: Rc<RefCell<bool>>,
    }

    impl Observer for Probe {
        fn name(&self) -> &str {
            "probe"
        }

        fn refresh_interval(&self) -> u64 {
            self.interval
        }

        fn update(&mut self, frame: &Frame, _history: &TelemetryHistory) -> io::Result<()> {
            if self.fail_at == Some(frame.tick) {
                return Err(io::Error::other("display gone"));
            }
            self.seen.borrow_mut().push(frame.tick);
            Ok(())
        }

        fn close(&mut self) -> io::Result<()> {
            *self.closed.borrow_mut() = true;
            Ok(())
        }
    }

    fn probe(interval: u64, fail_at: Option<u64>) -> (Probe, Rc<RefCell<Vec<u64>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let probe = Probe {
            interval,
            fail_at,
            seen: seen.clone(),
            closed: Rc::default(),
        };
        (probe, seen)
    }

    #[test]
    fn observers_refresh_at_their_interval() {
        let mut sink = TelemetrySink::new(200);
        let (every, every_seen) = probe(1, None);
        let (fifth, fifth_seen) = probe(5, None);
        sink.add_observer(Box::new(every));
        sink.add_observer(Box::new(fifth));
        for tick in 1..=12 {
            sink.record(&frame(tick, 40.0));
        }
        assert_eq!(every_seen.borrow().len(), 12);
        assert_eq!(*fifth_seen.borrow(), vec![5, 10]);
        assert_eq!(sink.history().len(), 12);
    }

    #[test]
    fn failing_observer_is_disabled() {
        let mut sink = TelemetrySink::new(200);
        let (flaky, flaky_seen) = probe(1, Some(3));
        let (steady, steady_seen) = probe(1, None);
        sink.add_observer(Box::new(flaky));
        sink.add_observer(Box::new(steady));
        for tick in 1..=6 {
            sink.record(&frame(tick, 40.0 - tick as f64));
        }
        assert_eq!(*flaky_seen.borrow(), vec![1, 2]);
        assert_eq!(steady_seen.borrow().len(), 6);
        assert_eq!(sink.active_observers(), vec!["probe"]);
        assert_eq!(sink.snapshot().distance.len(), 6);
    }

    #[test]
    fn close_reaches_all_observers() {
        let mut sink = TelemetrySink::new(10);
        let closed = Rc::new(RefCell::new(false));
        let (mut observer, _) = probe(1, None);
        observer.closed = closed.clone();
        sink.add_observer(Box::new(observer));
        sink.close();
        assert!(*closed.borrow());
        assert!(sink.active_observers().is_empty());
    }
}
