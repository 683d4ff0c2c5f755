// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use log::Level;
use std::time::SystemTime;

/// A log line ready to be formatted. Borrows everything from the `log` record.
#[derive(Debug)]
pub struct Record<'a> {
    pub timestamp: SystemTime,
    /// Simulation time of the tick that was running when the line was emitted
    pub sim_time: Option<f64>,
    pub level: Level,
    pub target: &'a str,
    pub file: Option<&'a str>,
    pub line: Option<u32>,
    pub tid: u32,
    pub args: &'a [u8],
}

/// Kernel id of the calling thread
pub fn current_tid() -> u32 {
    // SAFETY: gettid(2) has no preconditions and cannot fail
    unsafe { libc::gettid() as u32 }
}
