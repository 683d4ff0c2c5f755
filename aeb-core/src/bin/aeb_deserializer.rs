// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Print a recording written by `aeb-driver --record`

use aeb_core::telemetry::recorder::read_records;
use anyhow::{Context, Error};
use argh::FromArgs;
use log::{info, LevelFilter};
use std::path::PathBuf;

#[derive(FromArgs)]
#[argh(help_triggers("-h", "--help", "help"))]
/// Recording printer
struct Args {
    #[argh(positional, description = "recording file")]
    path: PathBuf,

    #[argh(description = "print only ticks with a collision or an active AEB")]
    #[argh(switch)]
    events: bool,
}

fn main() -> Result<(), Error> {
    let Args { path, events } = argh::from_env();

    aeb_logger::init(LevelFilter::Info, aeb_logger::Output::Stderr);

    // Reading to end, recordings of a single run are small
    let bytes = std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    info!("Read file with {} bytes", bytes.len());

    let records = read_records(&bytes).context("failed to decode recording")?;
    info!("Decoded {} records", records.len());

    for record in records
        .iter()
        .filter(|r| !events || r.collision || r.aeb_active)
    {
        println!("{record:#?}");
    }
    Ok(())
}
