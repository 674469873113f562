//! Peripheral stack interface

use crate::error::GattError;
use crate::uuid::Uuid16;
use async_trait::async_trait;
use std::ops::BitOr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

/// Largest attribute value a characteristic may hold
pub const MAX_ATTRIBUTE_LEN: usize = 512;

/// Characteristic permission bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CharacteristicFlags(u8);

impl CharacteristicFlags {
    pub const READ: Self = Self(0b001);
    pub const WRITE_WITHOUT_RESPONSE: Self = Self(0b010);
    pub const NOTIFY: Self = Self(0b100);

    /// Whether every bit of `other` is set
    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CharacteristicFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Declaration of one characteristic inside a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicConfig {
    pub uuid: Uuid16,
    pub initial_value: Vec<u8>,
    pub flags: CharacteristicFlags,
}

struct Slot {
    uuid: Uuid16,
    flags: CharacteristicFlags,
    value: watch::Sender<Vec<u8>>,
}

/// Handle to a registered characteristic.
///
/// The handle owns the current value. Every write replaces it and wakes the
/// subscribers; a radio backend forwards those wake-ups as notifications.
#[derive(Clone)]
pub struct CharacteristicHandle {
    slot: Arc<Slot>,
}

impl CharacteristicHandle {
    /// Create a handle holding `config.initial_value`
    pub fn new(config: CharacteristicConfig) -> Self {
        let (value, _) = watch::channel(config.initial_value);
        Self {
            slot: Arc::new(Slot {
                uuid: config.uuid,
                flags: config.flags,
                value,
            }),
        }
    }

    /// Characteristic identifier
    pub fn uuid(&self) -> Uuid16 {
        self.slot.uuid
    }

    /// Replace the value and notify subscribers. Never waits on them.
    pub fn write(&self, value: &[u8]) -> Result<(), GattError> {
        if value.len() > MAX_ATTRIBUTE_LEN {
            return Err(GattError::ValueTooLong {
                len: value.len(),
                max: MAX_ATTRIBUTE_LEN,
            });
        }
        trace!("Characteristic {} <- {:02X?}", self.slot.uuid, value);
        self.slot.value.send_replace(value.to_vec());
        Ok(())
    }

    /// Current value
    pub fn value(&self) -> Vec<u8> {
        self.slot.value.borrow().clone()
    }

    /// Subscribe to value changes. Only the latest value is retained.
    pub fn subscribe(&self) -> Result<watch::Receiver<Vec<u8>>, GattError> {
        if !self.slot.flags.contains(CharacteristicFlags::NOTIFY) {
            return Err(GattError::NotNotifiable(self.slot.uuid));
        }
        Ok(self.slot.value.subscribe())
    }
}

impl std::fmt::Debug for CharacteristicHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharacteristicHandle")
            .field("uuid", &self.slot.uuid)
            .field("flags", &self.slot.flags)
            .finish()
    }
}

/// A BLE peripheral: owns the radio, advertises, serves GATT services
#[async_trait]
pub trait PeripheralStack: Send + Sync {
    /// Power on the radio
    async fn enable_radio(&self) -> Result<(), GattError>;

    /// Set the advertised name and service identifiers
    async fn configure_advertisement(
        &self,
        local_name: &str,
        services: &[Uuid16],
    ) -> Result<(), GattError>;

    /// Begin advertising
    async fn start_advertisement(&self) -> Result<(), GattError>;

    /// Register a primary service, returning one handle per characteristic
    /// in declaration order
    async fn register_service(
        &self,
        service: Uuid16,
        characteristics: Vec<CharacteristicConfig>,
    ) -> Result<Vec<CharacteristicHandle>, GattError>;
}
