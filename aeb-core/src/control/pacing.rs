// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use log::{error, trace};
use std::thread;
use std::time::{Duration, Instant};

/// Keeps ticks aligned with wall clock time
///
/// Each tick is expected to take at most one cycle. The remainder of the cycle is slept
/// away, an overrun is reported and not compensated later.
#[derive(Debug)]
pub struct Pacer {
    cycle_time: Duration,
    enabled: bool,
    tick_start: Instant,
    overruns: u64,
}

impl Pacer {
    pub fn new(cycle_time: Duration, enabled: bool) -> Self {
        Self {
            cycle_time,
            enabled,
            tick_start: Instant::now(),
            overruns: 0,
        }
    }

    /// Mark the start of a tick
    pub fn start_tick(&mut self) {
        self.tick_start = Instant::now();
    }

    /// Sleep until the end of the current cycle
    pub fn finish_tick(&mut self) {
        if !self.enabled {
            return;
        }
        let tick_duration = self.tick_start.elapsed();
        let time_left = self.cycle_time.saturating_sub(tick_duration);
        if time_left.is_zero() {
            self.overruns += 1;
            error!(
                "Finished tick after {tick_duration:?}. Expected to be less than {:?}",
                self.cycle_time
            );
        } else {
            trace!("Finished tick after {tick_duration:?}. Sleeping for {time_left:?}");
            thread::sleep(time_left);
        }
    }

    /// Number of paced ticks that took longer than a cycle
    pub fn overruns(&self) -> u64 {
        self.overruns
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sleeps_out_the_cycle() {
        let mut pacer = Pacer::new(Duration::from_millis(30), true);
        let start = Instant::now();
        pacer.start_tick();
        pacer.finish_tick();
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(pacer.overruns(), 0);
    }

    #[test]
    fn overrun_is_counted() {
        let mut pacer = Pacer::new(Duration::from_millis(1), true);
        pacer.start_tick();
        thread::sleep(Duration::from_millis(5));
        pacer.finish_tick();
        assert_eq!(pacer.overruns(), 1);
    }

    #[test]
    fn disabled_pacer_does_not_sleep() {
        let mut pacer = Pacer::new(Duration::from_secs(5), false);
        let start = Instant::now();
        pacer.start_tick();
        pacer.finish_tick();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
