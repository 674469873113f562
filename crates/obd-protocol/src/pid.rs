//! OBD-II PID Definitions and Response Parsing
//!
//! Defines the Mode 01 Parameter IDs (PIDs) the dashboard reads and their
//! decoding formulas.

use crate::error::ObdError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard OBD-II PIDs for Mode 01 (current data)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Pid {
    /// Engine coolant temperature (0x05)
    CoolantTemp = 0x05,
    /// Engine RPM (0x0C)
    Rpm = 0x0C,
    /// Vehicle speed (0x0D)
    Speed = 0x0D,
    /// Intake air temperature (0x0F)
    IntakeAirTemp = 0x0F,
    /// Mass air flow rate (0x10)
    Maf = 0x10,
    /// Throttle position (0x11)
    ThrottlePosition = 0x11,
    /// Fuel tank level input (0x2F)
    FuelLevel = 0x2F,
    /// Ambient air temperature (0x46)
    AmbientTemp = 0x46,
    /// Engine oil temperature (0x5C)
    EngineOilTemp = 0x5C,
    /// Transmission actual gear (0xA4)
    ActualGear = 0xA4,
    /// Odometer (0xA6)
    Odometer = 0xA6,
}

impl Pid {
    /// Get the PID hex value
    pub fn as_hex(&self) -> u8 {
        *self as u8
    }

    /// Get the number of response bytes for this PID
    pub fn response_bytes(&self) -> usize {
        match self {
            Pid::Rpm | Pid::Maf => 2,
            Pid::ActualGear | Pid::Odometer => 4,
            _ => 1,
        }
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", self.as_hex())
    }
}

/// Response from a PID query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidResponse {
    /// The PID that was queried
    pub pid: Pid,
    /// Decoded value
    pub value: f64,
    /// Raw bytes from the response
    pub raw_bytes: Vec<u8>,
}

impl PidResponse {
    /// Create a new PID response by decoding raw bytes
    pub fn decode(pid: Pid, raw_bytes: Vec<u8>) -> Result<Self, ObdError> {
        if raw_bytes.len() < pid.response_bytes() {
            return Err(ObdError::InvalidResponse(format!(
                "PID {} expects {} data bytes, got {}",
                pid,
                pid.response_bytes(),
                raw_bytes.len()
            )));
        }
        let value = Self::decode_value(pid, &raw_bytes);
        Ok(Self {
            pid,
            value,
            raw_bytes,
        })
    }

    /// Decode the raw bytes to a value based on the PID formula.
    /// Callers guarantee `bytes` holds at least `pid.response_bytes()`.
    fn decode_value(pid: Pid, bytes: &[u8]) -> f64 {
        let a = bytes[0] as f64;
        match pid {
            // RPM: ((A*256)+B)/4
            Pid::Rpm => ((a * 256.0) + bytes[1] as f64) / 4.0,
            // Speed: A (km/h)
            Pid::Speed => a,
            // Temperatures: A - 40 (°C)
            Pid::CoolantTemp | Pid::IntakeAirTemp | Pid::AmbientTemp | Pid::EngineOilTemp => {
                a - 40.0
            }
            // MAF: ((A*256)+B) / 100 (g/s)
            Pid::Maf => ((a * 256.0) + bytes[1] as f64) / 100.0,
            // Fuel level, throttle position: A / 255 (fraction)
            Pid::FuelLevel | Pid::ThrottlePosition => a / 255.0,
            // Gear ratio: ((C*256)+D) / 1000
            Pid::ActualGear => ((bytes[2] as f64 * 256.0) + bytes[3] as f64) / 1000.0,
            // Odometer: (A*2^24 + B*2^16 + C*2^8 + D) / 10 (km)
            Pid::Odometer => {
                u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64 / 10.0
            }
        }
    }
}
