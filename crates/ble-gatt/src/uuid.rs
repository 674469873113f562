//! 16-bit Bluetooth SIG identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 16-bit UUID expanded over the Bluetooth base UUID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uuid16(pub u16);

/// Bluetooth base UUID, 0000xxxx-0000-1000-8000-00805f9b34fb
const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

impl Uuid16 {
    /// Full 128-bit form
    pub fn to_uuid(&self) -> uuid::Uuid {
        uuid::Uuid::from_u128(BASE_UUID | (u128::from(self.0) << 96))
    }
}

impl fmt::Display for Uuid16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl From<u16> for Uuid16 {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

/// Human Interface Device service, advertised by the dashboard bridge
pub const SERVICE_HUMAN_INTERFACE_DEVICE: Uuid16 = Uuid16(0x1812);

/// GATT characteristic presentation units used for telemetry values
pub mod units {
    use super::Uuid16;

    /// Thermodynamic temperature (degree Celsius)
    pub const DEGREE_CELSIUS: Uuid16 = Uuid16(0x272F);
    /// Length (mile)
    pub const DISTANCE: Uuid16 = Uuid16(0x27A4);
    /// Velocity
    pub const VELOCITY: Uuid16 = Uuid16(0x27A7);
    /// Percentage
    pub const PERCENTAGE: Uuid16 = Uuid16(0x27AD);
    /// Angular velocity (revolutions per minute)
    pub const REVOLUTIONS_PER_MINUTE: Uuid16 = Uuid16(0x27AF);
    /// Mass flow (gram per second)
    pub const MASS_FLOW: Uuid16 = Uuid16(0x27C1);
}
