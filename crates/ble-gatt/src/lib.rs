//! BLE Peripheral
//!
//! The interface the telemetry bridge uses to reach the radio: enable it,
//! register a GATT service, advertise, and write characteristic values that
//! are pushed to subscribed centrals as notifications.

mod error;
mod local;
mod peripheral;
mod uuid;

pub use error::GattError;
pub use local::{LocalPeripheral, MAX_LOCAL_NAME_LEN};
pub use peripheral::{
    CharacteristicConfig, CharacteristicFlags, CharacteristicHandle, PeripheralStack,
    MAX_ATTRIBUTE_LEN,
};
pub use uuid::{units, Uuid16, SERVICE_HUMAN_INTERFACE_DEVICE};
