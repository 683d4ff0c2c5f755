// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Fixed-width message codec
//!
//! Messages are plain sequences of 8 byte IEEE 754 floats in native byte order, without
//! framing, length prefix or checksum. Message boundaries follow from the fixed sizes only.
//!
//! | direction | bytes | fields                                             |
//! |-----------|-------|----------------------------------------------------|
//! | outbound  | 24    | distance, other_speed, ego_speed                   |
//! | inbound   | 32    | stop_ego, fcw_active, deceleration, aeb_active     |
//!
//! Boolean fields are recovered by rounding to the nearest integer; any nonzero result is
//! `true`. Every field must be finite: a NaN or infinite value, flags included, makes the
//! whole message unusable and the decision falls back like for any other malformed message.

use crate::error::LinkError;
use std::mem::size_of;

/// Size of a single field on the wire
pub const FIELD_SIZE: usize = size_of::<f64>();

/// Size of an encoded [OutboundTelemetry]
pub const OUTBOUND_LEN: usize = 3 * FIELD_SIZE;

/// Size of an encoded [InboundDecision]
pub const INBOUND_LEN: usize = 4 * FIELD_SIZE;

/// Measurements sent to the decision process once per tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutboundTelemetry {
    /// Distance between ego and cyclist
    pub distance: f64,
    /// Speed of the cyclist
    pub other_speed: f64,
    /// Speed of the ego vehicle
    pub ego_speed: f64,
}

/// Decision received from the decision process
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InboundDecision {
    pub stop_ego: bool,
    pub fcw_active: bool,
    /// Requested deceleration as a fraction, expected within [0, 1]
    pub deceleration: f64,
    pub aeb_active: bool,
}

macro_rules! encode_fields {
    ($len:expr, $($value:expr),+ $(,)?) => {{
        let mut buffer = [0u8; $len];
        let mut offset: usize = 0usize;

        $(
            let bytes = f64::to_ne_bytes($value);
            buffer[offset..offset + FIELD_SIZE].copy_from_slice(&bytes);
            offset += FIELD_SIZE;
        )+

        debug_assert_eq!(offset, $len, "field count does not match message length");
        buffer
    }}
}

macro_rules! decode_fields {
    ($bytes:expr, $len:expr, $($field:ident),+ $(,)?) => {
        let bytes: &[u8] = $bytes;
        if bytes.len() < $len {
            return Err(LinkError::Malformed {
                received: bytes.len(),
                expected: $len,
            });
        }
        let mut _offset: usize = 0usize;

        $(
            let mut field = [0u8; FIELD_SIZE];
            field.copy_from_slice(&bytes[_offset.._offset + FIELD_SIZE]);
            let $field = f64::from_ne_bytes(field);
            _offset += FIELD_SIZE;
        )+
    };
}

/// Serialize telemetry as `[distance, other_speed, ego_speed]`
pub fn encode_outbound(telemetry: &OutboundTelemetry) -> [u8; OUTBOUND_LEN] {
    encode_fields!(
        OUTBOUND_LEN,
        telemetry.distance,
        telemetry.other_speed,
        telemetry.ego_speed,
    )
}

/// Deserialize a decision from `[stop_ego, fcw_active, deceleration, aeb_active]`
///
/// Fails with [LinkError::Malformed] if fewer than [INBOUND_LEN] bytes are given and with
/// [LinkError::InvalidValue] if a field is NaN or infinite. Finite flag values other than
/// 0 and 1 are accepted and rounded.
pub fn decode_inbound(bytes: &[u8]) -> Result<InboundDecision, LinkError> {
    decode_fields!(bytes, INBOUND_LEN, stop_ego, fcw_active, deceleration, aeb_active);

    Ok(InboundDecision {
        stop_ego: flag(stop_ego, 0)?,
        fcw_active: flag(fcw_active, 1)?,
        deceleration: finite(deceleration, 2)?,
        aeb_active: flag(aeb_active, 3)?,
    })
}

/// Serialize a decision the way the decision process does. Counterpart of [decode_inbound].
pub fn encode_inbound(decision: &InboundDecision) -> [u8; INBOUND_LEN] {
    encode_fields!(
        INBOUND_LEN,
        decision.stop_ego as u8 as f64,
        decision.fcw_active as u8 as f64,
        decision.deceleration,
        decision.aeb_active as u8 as f64,
    )
}

/// Deserialize telemetry the way the decision process does. Counterpart of [encode_outbound].
pub fn decode_outbound(bytes: &[u8]) -> Result<OutboundTelemetry, LinkError> {
    decode_fields!(bytes, OUTBOUND_LEN, distance, other_speed, ego_speed);
    Ok(OutboundTelemetry {
        distance,
        other_speed,
        ego_speed,
    })
}

/// `field` is the position in the message for error reporting
fn finite(value: f64, field: usize) -> Result<f64, LinkError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(LinkError::InvalidValue { field })
    }
}

/// Round a boolean transmitted as float
fn flag(value: f64, field: usize) -> Result<bool, LinkError> {
    Ok(finite(value, field)?.round() != 0.0)
}
