// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Run the car-to-bicyclist AEB scenario against an external decision process

use aeb_core::configuration::Builder;
use aeb_core::control::ControlLoop;
use aeb_core::error::NoPeer;
use aeb_core::link::{self, Connection};
use aeb_core::quit::QuitSignal;
use aeb_core::scenario::ScenarioActors;
use aeb_core::telemetry::{Hud, TelemetrySink};
use aeb_core::world::KinematicWorld;
use aeb_logger::Output;
use anyhow::{Context, Error};
use argh::FromArgs;
use log::{error, info, warn, LevelFilter};
#[cfg(feature = "recording")]
use std::path::PathBuf;
use std::time::Duration;

#[derive(FromArgs)]
#[argh(help_triggers("-h", "--help", "help"))]
/// AEB scenario driver
struct Args {
    #[argh(description = "port to listen on for the decision process (default 9001)")]
    #[argh(option, short = 'p')]
    port: Option<u16>,

    #[argh(description = "give up waiting for the decision process after this many ms")]
    #[argh(option)]
    accept_timeout_ms: Option<u64>,

    #[argh(description = "wait at most this many ms for a decision per tick (default 50)")]
    #[argh(option)]
    recv_timeout_ms: Option<u64>,

    #[argh(description = "stop after this many seconds of simulation time")]
    #[argh(option, short = 'd')]
    duration: Option<f64>,

    #[argh(description = "run as fast as possible instead of in real time")]
    #[argh(switch)]
    no_pacing: bool,

    #[argh(description = "do not show the HUD")]
    #[argh(switch)]
    no_hud: bool,

    #[cfg(feature = "recording")]
    #[argh(description = "record every tick to this file")]
    #[argh(option, short = 'r')]
    record: Option<PathBuf>,

    #[argh(description = "log level")]
    #[argh(option, short = 'l')]
    log_level: Option<LevelFilter>,
}

fn main() -> Result<(), Error> {
    let args: Args = argh::from_env();

    aeb_logger::init(args.log_level.unwrap_or(LevelFilter::Info), Output::Stderr);

    let mut builder = Builder::default()
        .realtime(!args.no_pacing)
        .hud(!args.no_hud);
    if let Some(port) = args.port {
        builder = builder.port(port);
    }
    if let Some(timeout) = args.accept_timeout_ms {
        builder = builder.accept_timeout(Duration::from_millis(timeout));
    }
    if let Some(timeout) = args.recv_timeout_ms {
        builder = builder.recv_timeout(Duration::from_millis(timeout));
    }
    if let Some(duration) = args.duration {
        builder = builder.max_duration(duration);
    }
    #[cfg(feature = "recording")]
    if let Some(path) = args.record {
        builder = builder.record_path(path);
    }
    let config = builder.build().context("invalid configuration")?;

    let quit = QuitSignal::with_os_signals().context("failed to install signal handlers")?;

    // Scenario setup
    let mut world = KinematicWorld::new();
    let actors =
        ScenarioActors::spawn_kinematic(&mut world).context("failed to spawn scenario actors")?;

    // Wait for the decision process
    let listener = link::listen(config.link.bind_addr)?;
    info!(
        "Waiting for decision process on {}",
        listener.local_addr()
    );
    // On quit the loop below stops before its first tick and the actors are torn down
    let connection: Option<Connection> = match listener.accept_one(&config.link, &quit) {
        Ok(connection) => Some(connection),
        Err(NoPeer::Quit) => None,
        Err(e) => {
            warn!("Running without decision process: {e}");
            None
        }
    };

    // Telemetry observers
    let mut telemetry = TelemetrySink::new(config.history_capacity);
    if config.hud {
        telemetry.add_observer(Box::new(Hud::stdout(config.hud_refresh)));
    }
    #[cfg(feature = "recording")]
    if let Some(path) = &config.record_path {
        let recorder = aeb_core::telemetry::recorder::Recorder::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        telemetry.add_observer(Box::new(recorder));
    }

    let mut control = ControlLoop::new(world, actors, connection, &config, telemetry, quit);
    let result = control.run();
    let summary = control.shutdown();

    info!(
        "Finished after {} ticks ({:.2}s): {} live decisions, {} timeouts, {} malformed, {} skipped",
        summary.ticks,
        summary.sim_time,
        summary.link.live,
        summary.link.timeouts,
        summary.link.malformed,
        summary.link.skipped,
    );
    match summary.collision_at {
        Some(at) => error!("Collision at {at:.2}s"),
        None => info!("No collision"),
    }
    if summary.overruns > 0 {
        warn!("{} ticks overran the step", summary.overruns);
    }

    result.context("control loop failed")?;
    Ok(())
}
