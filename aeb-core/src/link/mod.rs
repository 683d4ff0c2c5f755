// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Point-to-point link to the external decision process

pub mod codec;
mod interface;
pub mod transport;

pub use codec::{InboundDecision, OutboundTelemetry, INBOUND_LEN, OUTBOUND_LEN};
pub use interface::Exchange;
pub use transport::{listen, Connection, Listener};
