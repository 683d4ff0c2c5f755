// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Console logger for the AEB scenario driver.
//!
//! Implements the `log` facade. Every line carries the wall clock time and, once the
//! control loop has started, the simulation time of the tick that emitted it. Output
//! goes to stderr by default so that it does not interleave with the HUD on stdout.

use log::{LevelFilter, Log, Metadata};
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

mod console;
pub mod fmt;
pub mod record;

pub use console::Output;

const ENV_RUST_LOG: &str = "RUST_LOG";
const MAX_ARGS_SIZE: usize = 8 * 1024;

/// Bit pattern of the simulation time, `u64::MAX` (a NaN) while unset
static SIM_TIME: AtomicU64 = AtomicU64::new(u64::MAX);

/// Initialize the logger.
///
/// A valid level passed as `RUST_LOG` environment variable overrides `level`.
pub fn init(level: LevelFilter, output: Output) {
    let logger = Logger::new(output);

    log::set_max_level(level_from_env().unwrap_or(level));
    log::set_boxed_logger(Box::new(logger)).expect("failed to set logger")
}

/// Publish the simulation time of the current tick. Subsequent log lines are stamped with it.
pub fn set_sim_time(seconds: f64) {
    SIM_TIME.store(seconds.to_bits(), Ordering::Relaxed);
}

/// Forget the simulation time, e.g. after the control loop stopped.
pub fn clear_sim_time() {
    SIM_TIME.store(u64::MAX, Ordering::Relaxed);
}

fn sim_time() -> Option<f64> {
    let seconds = f64::from_bits(SIM_TIME.load(Ordering::Relaxed));
    seconds.is_finite().then_some(seconds)
}

/// The driver logger.
#[derive(Debug)]
pub struct Logger {
    console: console::Console,
}

impl Logger {
    /// Create a new logger writing to `output`.
    pub fn new(output: Output) -> Self {
        Self {
            console: console::Console::new(output),
        }
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Format the arguments into a stack buffer. Overlong messages are truncated.
        let args_buffer = &mut [0u8; MAX_ARGS_SIZE];
        let args = {
            let mut writer = io::Cursor::new(&mut args_buffer[..]);
            let _ = write!(&mut writer, "{}", record.args());
            let len = writer.position() as usize;
            &args_buffer[0..len]
        };

        let record = record::Record {
            timestamp: SystemTime::now(),
            sim_time: sim_time(),
            level: record.level(),
            target: record.target(),
            file: record.file(),
            line: record.line(),
            tid: record::current_tid(),
            args,
        };

        // A logger has nowhere to report its own failures
        let _ = self.console.write(&record);
    }

    fn flush(&self) {
        let _ = self.console.flush();
    }
}

/// Try to parse the log level from the environment variable `RUST_LOG`.
fn level_from_env() -> Option<LevelFilter> {
    std::env::var(ENV_RUST_LOG).ok().and_then(|s| {
        LevelFilter::from_str(&s)
            .inspect_err(|_| eprintln!("Failed to parse log level from `RUST_LOG={s}`"))
            .ok()
    })
}
