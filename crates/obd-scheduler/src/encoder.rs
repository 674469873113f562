//! Fixed-width payload encoding
//!
//! Every metric is published as exactly four bytes: a little-endian IEEE-754
//! `f32`, or for raw metrics the vehicle's reply bytes untouched.

use crate::metric::{Reading, Transform};
use std::fmt;

/// Four bytes written to a publish slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EncodedPayload(pub [u8; EncodedPayload::LEN]);

impl EncodedPayload {
    /// Payload width in bytes
    pub const LEN: usize = 4;

    /// Little-endian encoding of a float
    pub fn from_f32(value: f32) -> Self {
        Self(value.to_le_bytes())
    }

    /// Interpret the payload as a little-endian float
    pub fn to_f32(&self) -> f32 {
        f32::from_le_bytes(self.0)
    }

    /// The payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for EncodedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a:02X} {b:02X} {c:02X} {d:02X}")
    }
}

/// Encode a reading. Total: every reading maps to a payload.
pub fn encode(transform: Transform, reading: &Reading) -> EncodedPayload {
    match transform {
        Transform::Scale(factor) => EncodedPayload::from_f32(reading.value as f32 * factor),
        Transform::Widen => EncodedPayload::from_f32(reading.value.trunc() as f32),
        Transform::RawPassthrough => {
            let mut bytes = [0u8; EncodedPayload::LEN];
            let len = reading.raw_bytes.len().min(EncodedPayload::LEN);
            bytes[..len].copy_from_slice(&reading.raw_bytes[..len]);
            EncodedPayload(bytes)
        }
    }
}
