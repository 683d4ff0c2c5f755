// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types
//!
//! [Error] is fatal for the run. [LinkError] covers the recoverable faults of the decision
//! link and never escapes a control loop tick. [NoPeer] is the outcome of a failed accept.

use crate::world::ActorId;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

/// Fatal error
#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// The listening socket could not be set up
    Bind((std::io::Error, SocketAddr)),
    World(WorldError),
    Config(&'static str),
    /// The control loop has already stopped
    Stopped,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Bind((e, addr)) => write!(f, "Bind error: failed to listen on {addr}, {e}"),
            Error::World(e) => write!(f, "World error: {e}"),
            Error::Config(description) => write!(f, "Configuration error, {}", description),
            Error::Stopped => write!(f, "Control loop stopped"),
        }
    }
}

impl From<WorldError> for Error {
    fn from(e: WorldError) -> Self {
        Error::World(e)
    }
}

/// Recoverable fault of the decision link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// No data arrived within the receive timeout
    Timeout,
    /// The connection is unusable for the rest of the session
    Broken(ErrorKind),
    /// A message was cut short
    Malformed { received: usize, expected: usize },
    /// A complete message carried a NaN or infinite value in field `field`
    InvalidValue { field: usize },
}

impl LinkError {
    pub fn is_broken(&self) -> bool {
        matches!(self, LinkError::Broken(_))
    }

    /// Whether a message arrived but could not be used
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            LinkError::Malformed { .. } | LinkError::InvalidValue { .. }
        )
    }
}

impl std::error::Error for LinkError {}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LinkError::Timeout => write!(f, "timeout while waiting for decision"),
            LinkError::Broken(kind) => write!(f, "link broken: {kind}"),
            LinkError::Malformed { received, expected } => {
                write!(f, "malformed message: {received} of {expected} bytes received")
            }
            LinkError::InvalidValue { field } => {
                write!(f, "malformed message: field {field} is not a finite number")
            }
        }
    }
}

/// No decision process connected
#[derive(Debug)]
pub enum NoPeer {
    TimedOut(Duration),
    /// Quit was requested while waiting
    Quit,
    Failed(std::io::Error),
}

impl std::error::Error for NoPeer {}

impl std::fmt::Display for NoPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            NoPeer::TimedOut(after) => write!(f, "no peer connected within {after:?}"),
            NoPeer::Quit => write!(f, "quit requested while waiting for peer"),
            NoPeer::Failed(e) => write!(f, "accepting peer failed: {e}"),
        }
    }
}

/// Failure reported by the world collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum WorldError {
    UnknownActor(ActorId),
    Tick(String),
    Spawn(String),
}

impl std::error::Error for WorldError {}

impl std::fmt::Display for WorldError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            WorldError::UnknownActor(id) => write!(f, "unknown actor {id}"),
            WorldError::Tick(description) => write!(f, "world tick failed, {description}"),
            WorldError::Spawn(description) => write!(f, "spawning failed, {description}"),
        }
    }
}
