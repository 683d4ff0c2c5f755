// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Tick recorder. Records every tick of a run for offline analysis.
//!
//! The recording is a plain sequence of postcard encoded [TickRecord]s.

use crate::control::{ActuationCommand, DecisionSource, LoopState};
use crate::telemetry::{Frame, Observer, TelemetryHistory};
use log::{debug, info, trace};
use postcard::experimental::max_size::MaxSize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Recorded state of one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, MaxSize)]
pub struct TickRecord {
    pub tick: u64,
    pub sim_time: f64,
    pub distance: f64,
    pub ttc: f64,
    pub ego_speed: f64,
    pub other_speed: f64,
    pub stop_ego: bool,
    pub fcw_active: bool,
    pub deceleration: f64,
    pub aeb_active: bool,
    pub source: DecisionSource,
    pub command: ActuationCommand,
    pub collision: bool,
    pub state: LoopState,
}

impl From<&Frame> for TickRecord {
    fn from(frame: &Frame) -> Self {
        Self {
            tick: frame.tick,
            sim_time: frame.sim_time,
            distance: frame.metrics.distance,
            ttc: frame.metrics.ttc,
            ego_speed: frame.metrics.ego_speed,
            other_speed: frame.metrics.other_speed,
            stop_ego: frame.decision.stop_ego,
            fcw_active: frame.decision.fcw_active,
            deceleration: frame.decision.deceleration,
            aeb_active: frame.decision.aeb_active,
            source: frame.source,
            command: frame.command,
            collision: frame.collision,
            state: frame.state,
        }
    }
}

/// Writes a [TickRecord] per tick
pub struct Recorder<W: Write> {
    writer: W,
    written: u64,
}

impl Recorder<BufWriter<fs::File>> {
    /// Create the recording file, replacing an existing one
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = fs::File::create(path)?;
        info!("Recording to {}", path.display());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> Recorder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn write(&mut self, record: &TickRecord) -> io::Result<()> {
        let mut buf = [0u8; TickRecord::POSTCARD_MAX_SIZE];
        let serialized = postcard::to_slice(record, &mut buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        trace!("Writing record of tick {}", record.tick);
        self.writer.write_all(serialized)?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Observer for Recorder<W> {
    fn name(&self) -> &str {
        "recorder"
    }

    fn update(&mut self, frame: &Frame, _history: &TelemetryHistory) -> io::Result<()> {
        self.write(&TickRecord::from(frame))
    }

    fn close(&mut self) -> io::Result<()> {
        debug!("Flushing recording after {} records", self.written);
        self.writer.flush()
    }
}

/// Decode all records of a recording
pub fn read_records(mut bytes: &[u8]) -> Result<Vec<TickRecord>, postcard::Error> {
    let mut records = Vec::new();
    while !bytes.is_empty() {
        let (record, remaining) = postcard::take_from_bytes(bytes)?;
        records.push(record);
        bytes = remaining;
    }
    Ok(records)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::telemetry::test::frame;

    #[test]
    fn records_are_read_back_in_order() {
        let mut recorder = Recorder::new(Vec::new());
        let history = TelemetryHistory::new(4);
        let mut collided = frame(2, 1.5);
        collided.collision = true;
        collided.state = LoopState::Degraded;
        collided.metrics.ttc = f64::INFINITY;
        recorder.update(&frame(1, 10.0), &history).unwrap();
        recorder.update(&collided, &history).unwrap();
        recorder.close().unwrap();
        assert_eq!(recorder.written(), 2);

        let bytes = recorder.into_inner();
        let records = read_records(&bytes).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], TickRecord::from(&frame(1, 10.0)));
        assert_eq!(records[1].tick, 2);
        assert!(records[1].collision);
        assert_eq!(records[1].state, LoopState::Degraded);
        assert_eq!(records[1].ttc, f64::INFINITY);
    }

    #[test]
    fn truncated_recording_is_an_error() {
        let mut recorder = Recorder::new(Vec::new());
        recorder
            .update(&frame(1, 10.0), &TelemetryHistory::new(1))
            .unwrap();
        let bytes = recorder.into_inner();
        assert!(read_records(&bytes[..bytes.len() - 1]).is_err());
    }
}
