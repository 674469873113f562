//! GATT Error Types

use crate::uuid::Uuid16;
use thiserror::Error;

/// Errors raised by a peripheral stack
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GattError {
    /// The radio could not be powered on
    #[error("Bluetooth radio unavailable: {0}")]
    RadioUnavailable(String),

    /// An operation needs the radio to be enabled first
    #[error("Bluetooth radio is not enabled")]
    RadioDisabled,

    /// Advertising was started before being configured
    #[error("Advertisement is not configured")]
    AdvertisementNotConfigured,

    /// The advertisement parameters were rejected
    #[error("Invalid advertisement: {0}")]
    InvalidAdvertisement(String),

    /// Services cannot be added once advertising
    #[error("Cannot register service {0} while advertising")]
    AlreadyAdvertising(Uuid16),

    /// A characteristic identifier is already in use
    #[error("Characteristic {0} is already registered")]
    DuplicateCharacteristic(Uuid16),

    /// The characteristic does not support notifications
    #[error("Characteristic {0} does not notify")]
    NotNotifiable(Uuid16),

    /// The value does not fit in a single attribute
    #[error("Value of {len} bytes exceeds the {max} byte attribute limit")]
    ValueTooLong { len: usize, max: usize },
}
