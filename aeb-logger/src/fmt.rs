// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use crate::record::Record;
use console::{style, Color};
use log::Level;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;
use time::format_description::FormatItem;
use time::macros::format_description;

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour]:[minute]:[second].[subsecond digits:3]");

/// Width of the target column, grows with the longest target seen so far
static TARGET_SIZE: AtomicUsize = AtomicUsize::new(16);

/// Width of the simulation time column, e.g. `t=  12.35`
const SIM_TIME_WIDTH: usize = 9;

pub fn format<W: io::Write>(record: &Record, mut writer: W) -> io::Result<()> {
    let timestamp = format_timestamp(record.timestamp)?;

    let level = {
        let level_color = match record.level {
            Level::Error => Color::Red,
            Level::Warn => Color::Yellow,
            Level::Info => Color::Green,
            Level::Debug => Color::Color256(243),
            Level::Trace => Color::White,
        };
        style(record.level).bold().fg(level_color)
    };

    let sim_time = match record.sim_time {
        Some(t) => style(format_sim_time(t)).fg(Color::Cyan),
        None => style(" ".repeat(SIM_TIME_WIDTH)),
    };

    let target = {
        let target = record.target;
        TARGET_SIZE.fetch_max(target.len(), Ordering::Relaxed);
        let target_size = TARGET_SIZE.load(Ordering::Relaxed);
        style(format!("{target:<target_size$}")).fg(target_color(target))
    };

    let tid = record.tid;
    let message = String::from_utf8_lossy(record.args);

    // Log location on trace level - otherwise just the message.
    if record.level == Level::Trace {
        let file = record.file.unwrap_or("file unknown");
        let line = record.line.unwrap_or(0);
        writeln!(
            writer,
            "{timestamp} {sim_time} {target} ({tid:x}): {level:<5}: {file}:{line}: {message}",
        )
    } else {
        writeln!(
            writer,
            "{timestamp} {sim_time} {target} ({tid:x}): {level:<5}: {message}"
        )
    }
}

fn format_timestamp(timestamp: SystemTime) -> io::Result<String> {
    let nanos = timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "timestamp before epoch"))?
        .as_nanos() as i128;
    time::OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        .format(TIMESTAMP_FORMAT)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn format_sim_time(seconds: f64) -> String {
    format!("t={seconds:>7.2}")
}

/// Derive a stable color from the target name so that modules are easy to tell apart.
fn target_color(target: &str) -> Color {
    let hash = target.bytes().fold(42u8, |c, x| c ^ x);
    // Some colors are hard to read on dark terminals
    let color = match hash {
        c @ 0..=1 => c + 2,
        c @ 16..=21 => c + 6,
        c @ 232..=240 => c + 9,
        c => c,
    };
    Color::Color256(color)
}

#[cfg(test)]
mod test {
    use super::{format, format_sim_time, SIM_TIME_WIDTH};
    use crate::record::Record;
    use log::Level;
    use std::time::SystemTime;

    fn record<'a>(sim_time: Option<f64>, level: Level, args: &'a [u8]) -> Record<'a> {
        Record {
            timestamp: SystemTime::now(),
            sim_time,
            level,
            target: "aeb_core::control",
            file: Some("control/mod.rs"),
            line: Some(42),
            tid: 0x2a,
            args,
        }
    }

    #[test]
    fn sim_time_column_width() {
        assert_eq!(format_sim_time(0.05).len(), SIM_TIME_WIDTH);
        assert_eq!(format_sim_time(1234.5).len(), SIM_TIME_WIDTH);
    }

    #[test]
    fn line_contains_message_and_sim_time() {
        let mut out = Vec::new();
        format(&record(Some(2.5), Level::Warn, b"link timeout"), &mut out).unwrap();
        let line = String::from_utf8(out).unwrap();
        assert!(line.contains("link timeout"));
        assert!(line.contains("t=   2.50"));
        assert!(line.contains("WARN"));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn trace_line_carries_location() {
        let mut out = Vec::new();
        format(&record(None, Level::Trace, b"sent 24 bytes"), &mut out).unwrap();
        let line = String::from_utf8(out).unwrap();
        assert!(line.contains("control/mod.rs:42"));
        assert!(!line.contains("t="));
    }

    #[test]
    fn truncated_utf8_is_tolerated() {
        let mut out = Vec::new();
        // "∞" cut after its first byte
        format(&record(None, Level::Info, &[b'T', 0xe2]), &mut out).unwrap();
        assert!(String::from_utf8(out).is_ok());
    }
}
