// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Run configuration and its builder

use crate::error::Error;
use crate::scenario::ScenarioParams;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
#[cfg(feature = "recording")]
use std::path::PathBuf;
use std::time::Duration;

/// Port the decision process connects to
pub const DEFAULT_PORT: u16 = 9001;

/// Default listening address, loopback only
pub const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT);

/// Default simulation step in seconds
pub const DEFAULT_FIXED_STEP: f64 = 0.05;

/// Default number of samples kept per telemetry series
pub const DEFAULT_HISTORY_CAPACITY: usize = 200;

/// HUD refresh interval in recorded samples
pub const DEFAULT_HUD_REFRESH: u64 = 1;

/// Settings of the decision link
#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    /// Address to listen on for the decision process
    pub bind_addr: SocketAddr,

    /// How long to wait for the decision process, `None` waits forever
    pub accept_timeout: Option<Duration>,

    /// Bounded wait for a decision, kept well below the simulation step
    pub recv_timeout: Duration,

    /// Bounded wait for the socket to take an outbound message
    pub send_timeout: Duration,

    /// Extra waits granted to complete a message whose first bytes already arrived
    pub partial_retries: u32,

    /// Length of each of those extra waits
    pub partial_retry_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR,
            accept_timeout: None,
            recv_timeout: Duration::from_millis(50),
            send_timeout: Duration::from_millis(50),
            partial_retries: 3,
            partial_retry_interval: Duration::from_millis(10),
        }
    }
}

/// Complete configuration of a driver run
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub link: LinkConfig,

    /// Simulation time advanced per tick, in seconds
    pub fixed_step: f64,

    /// Stop after this much simulation time, `None` runs until quit
    pub max_duration: Option<f64>,

    /// Sleep out the remainder of each step so that the run follows wall clock time
    pub realtime: bool,

    /// Number of samples kept per telemetry series
    pub history_capacity: usize,

    /// Show the HUD on stdout
    pub hud: bool,

    /// Redraw the HUD every this many samples
    pub hud_refresh: u64,

    /// Write a recording of every tick to this file
    #[cfg(feature = "recording")]
    pub record_path: Option<PathBuf>,

    pub scenario: ScenarioParams,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            link: LinkConfig::default(),
            fixed_step: DEFAULT_FIXED_STEP,
            max_duration: None,
            realtime: true,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            hud: true,
            hud_refresh: DEFAULT_HUD_REFRESH,
            #[cfg(feature = "recording")]
            record_path: None,
            scenario: ScenarioParams::default(),
        }
    }
}

/// Run configuration builder
///
/// Unset values fall back to the defaults of [RunConfig]. Values are validated by
/// [Builder::build].
#[derive(Default)]
pub struct Builder {
    pub bind: Option<SocketAddr>,
    pub accept_timeout: Option<Duration>,
    pub recv_timeout: Option<Duration>,
    pub send_timeout: Option<Duration>,
    pub partial_retries: Option<(u32, Duration)>,
    pub fixed_step: Option<f64>,
    pub max_duration: Option<f64>,
    pub realtime: Option<bool>,
    pub history_capacity: Option<usize>,
    pub hud: Option<bool>,
    pub hud_refresh: Option<u64>,
    #[cfg(feature = "recording")]
    pub record_path: Option<PathBuf>,
    pub scenario: Option<ScenarioParams>,
}

impl Builder {
    /// Set the local bind address
    pub fn bind(mut self, bind: SocketAddr) -> Self {
        self.bind = Some(bind);
        self
    }

    /// Listen on the given loopback port
    pub fn port(self, port: u16) -> Self {
        self.bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port))
    }

    /// Give up waiting for the decision process after `timeout`
    pub fn accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout = Some(timeout);
        self
    }

    /// Set the bounded wait for a decision
    pub fn recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = Some(timeout);
        self
    }

    /// Set the bounded wait for an outbound message
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Set the retry budget for incomplete messages
    pub fn partial_retries(mut self, retries: u32, interval: Duration) -> Self {
        self.partial_retries = Some((retries, interval));
        self
    }

    /// Set the simulation step in seconds
    pub fn fixed_step(mut self, seconds: f64) -> Self {
        self.fixed_step = Some(seconds);
        self
    }

    /// Stop after the given simulation time in seconds
    pub fn max_duration(mut self, seconds: f64) -> Self {
        self.max_duration = Some(seconds);
        self
    }

    /// Enable or disable wall clock pacing
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = Some(realtime);
        self
    }

    /// Set the number of samples kept per telemetry series
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = Some(capacity);
        self
    }

    /// Enable or disable the HUD
    pub fn hud(mut self, hud: bool) -> Self {
        self.hud = Some(hud);
        self
    }

    /// Redraw the HUD every `samples` samples
    pub fn hud_refresh(mut self, samples: u64) -> Self {
        self.hud_refresh = Some(samples);
        self
    }

    /// Record every tick to the given file
    #[cfg(feature = "recording")]
    pub fn record_path(mut self, path: PathBuf) -> Self {
        self.record_path = Some(path);
        self
    }

    /// Override the scenario constants
    pub fn scenario(mut self, scenario: ScenarioParams) -> Self {
        self.scenario = Some(scenario);
        self
    }

    pub fn build(self) -> Result<RunConfig, Error> {
        let defaults = RunConfig::default();
        let link_defaults = defaults.link;

        let (partial_retries, partial_retry_interval) = self.partial_retries.unwrap_or((
            link_defaults.partial_retries,
            link_defaults.partial_retry_interval,
        ));
        let link = LinkConfig {
            bind_addr: self.bind.unwrap_or(link_defaults.bind_addr),
            accept_timeout: self.accept_timeout.or(link_defaults.accept_timeout),
            recv_timeout: self.recv_timeout.unwrap_or(link_defaults.recv_timeout),
            send_timeout: self.send_timeout.unwrap_or(link_defaults.send_timeout),
            partial_retries,
            partial_retry_interval,
        };
        if link.recv_timeout.is_zero() || link.send_timeout.is_zero() {
            return Err(Error::Config("link timeouts must be positive"));
        }

        let fixed_step = self.fixed_step.unwrap_or(defaults.fixed_step);
        if !(fixed_step.is_finite() && fixed_step > 0.0) {
            return Err(Error::Config("fixed step must be a positive number of seconds"));
        }

        let max_duration = self.max_duration.or(defaults.max_duration);
        if max_duration.is_some_and(|d| !(d.is_finite() && d >= 0.0)) {
            return Err(Error::Config("maximum duration must not be negative"));
        }

        let history_capacity = self.history_capacity.unwrap_or(defaults.history_capacity);
        if history_capacity == 0 {
            return Err(Error::Config("history capacity must not be zero"));
        }

        let hud_refresh = self.hud_refresh.unwrap_or(defaults.hud_refresh);
        if hud_refresh == 0 {
            return Err(Error::Config("HUD refresh interval must not be zero"));
        }

        Ok(RunConfig {
            link,
            fixed_step,
            max_duration,
            realtime: self.realtime.unwrap_or(defaults.realtime),
            history_capacity,
            hud: self.hud.unwrap_or(defaults.hud),
            hud_refresh,
            #[cfg(feature = "recording")]
            record_path: self.record_path,
            scenario: self.scenario.unwrap_or(defaults.scenario),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = Builder::default().build().unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.link.bind_addr.port(), 9001);
        assert!(config.link.bind_addr.ip().is_loopback());
        assert!(config.link.recv_timeout < Duration::from_millis(100));
        assert_eq!(config.history_capacity, 200);
        assert_eq!(config.hud_refresh, 1);
    }

    #[test]
    fn overrides() {
        let config = Builder::default()
            .port(9100)
            .accept_timeout(Duration::from_secs(3))
            .recv_timeout(Duration::from_millis(20))
            .fixed_step(0.1)
            .max_duration(30.0)
            .realtime(false)
            .hud(false)
            .build()
            .unwrap();
        assert_eq!(config.link.bind_addr.port(), 9100);
        assert_eq!(config.link.accept_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.link.recv_timeout, Duration::from_millis(20));
        assert_eq!(config.fixed_step, 0.1);
        assert_eq!(config.max_duration, Some(30.0));
        assert!(!config.realtime);
        assert!(!config.hud);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Builder::default().fixed_step(0.0).build().is_err());
        assert!(Builder::default().fixed_step(f64::NAN).build().is_err());
        assert!(Builder::default().history_capacity(0).build().is_err());
        assert!(Builder::default().max_duration(-1.0).build().is_err());
        assert!(Builder::default()
            .recv_timeout(Duration::ZERO)
            .build()
            .is_err());
        assert!(Builder::default().hud_refresh(0).build().is_err());
    }
}
