// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Bounded telemetry history

use std::collections::VecDeque;

/// TTC values above this are shown at this value
pub const PLOT_TTC_CAP: f64 = 10.0;

/// Fixed-capacity FIFO, evicting the oldest item on overflow
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `item`, returning the evicted item if the buffer was full
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }
}

/// Measurements of one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    pub time: f64,
    pub distance: f64,
    /// Unbounded, may be infinite
    pub ttc: f64,
    pub ego_speed: f64,
    pub other_speed: f64,
}

/// Recent telemetry of the run
///
/// Samples are kept as a whole so that all series stay aligned on the same time axis.
#[derive(Debug, Clone)]
pub struct TelemetryHistory {
    samples: RingBuffer<TelemetrySample>,
    recorded: u64,
}

impl TelemetryHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: RingBuffer::new(capacity),
            recorded: 0,
        }
    }

    pub fn record(&mut self, sample: TelemetrySample) {
        self.samples.push(sample);
        self.recorded += 1;
    }

    /// Number of samples recorded over the lifetime, including evicted ones
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.samples.latest()
    }

    pub fn samples(&self) -> impl Iterator<Item = &TelemetrySample> {
        self.samples.iter()
    }

    /// Ordered copies of each series, oldest first
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let len = self.samples.len();
        let mut snapshot = TelemetrySnapshot {
            time: Vec::with_capacity(len),
            distance: Vec::with_capacity(len),
            ttc: Vec::with_capacity(len),
            ego_speed: Vec::with_capacity(len),
            other_speed: Vec::with_capacity(len),
        };
        for sample in self.samples.iter() {
            snapshot.time.push(sample.time);
            snapshot.distance.push(sample.distance);
            snapshot.ttc.push(sample.ttc);
            snapshot.ego_speed.push(sample.ego_speed);
            snapshot.other_speed.push(sample.other_speed);
        }
        snapshot
    }
}

/// Copy of the telemetry history, one vector per series
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetrySnapshot {
    pub time: Vec<f64>,
    pub distance: Vec<f64>,
    pub ttc: Vec<f64>,
    pub ego_speed: Vec<f64>,
    pub other_speed: Vec<f64>,
}

impl TelemetrySnapshot {
    /// TTC series limited to [PLOT_TTC_CAP]
    pub fn ttc_for_display(&self) -> Vec<f64> {
        self.ttc.iter().map(|ttc| ttc.min(PLOT_TTC_CAP)).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample(time: f64) -> TelemetrySample {
        TelemetrySample {
            time,
            distance: 40.0 - time,
            ttc: f64::INFINITY,
            ego_speed: time,
            other_speed: 0.0,
        }
    }

    #[test]
    fn ring_buffer_evicts_oldest() {
        let mut buffer = RingBuffer::new(3);
        assert_eq!(buffer.push(1), None);
        assert_eq!(buffer.push(2), None);
        assert_eq!(buffer.push(3), None);
        assert_eq!(buffer.push(4), Some(1));
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(buffer.latest(), Some(&4));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut buffer = RingBuffer::new(0);
        buffer.push('a');
        buffer.push('b');
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.latest(), Some(&'b'));
    }

    #[test]
    fn history_keeps_the_latest_samples() {
        let mut history = TelemetryHistory::new(200);
        for tick in 0..250 {
            history.record(sample(tick as f64));
        }
        let snapshot = history.snapshot();
        assert_eq!(history.recorded(), 250);
        assert_eq!(history.len(), 200);
        assert_eq!(snapshot.time.len(), 200);
        assert_eq!(snapshot.time.first(), Some(&50.0));
        assert_eq!(snapshot.time.last(), Some(&249.0));
        assert_eq!(snapshot.distance.last(), Some(&-209.0));
        assert_eq!(snapshot.ego_speed.len(), snapshot.other_speed.len());
    }

    #[test]
    fn display_ttc_is_capped() {
        let mut history = TelemetryHistory::new(4);
        for ttc in [f64::INFINITY, 12.0, 3.5] {
            history.record(TelemetrySample {
                ttc,
                ..sample(0.0)
            });
        }
        let snapshot = history.snapshot();
        assert_eq!(snapshot.ttc, vec![f64::INFINITY, 12.0, 3.5]);
        assert_eq!(snapshot.ttc_for_display(), vec![10.0, 10.0, 3.5]);
    }
}
