// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::LinkError;
use crate::link::{InboundDecision, OutboundTelemetry};

/// One request/response round with the decision process per control loop tick.
pub trait Exchange {
    /// Send the tick's telemetry and wait (bounded) for the matching decision
    fn exchange(&mut self, telemetry: &OutboundTelemetry) -> Result<InboundDecision, LinkError>;

    /// Close the link. Later exchanges fail with [LinkError::Broken].
    fn close(&mut self) -> std::io::Result<()>;
}
