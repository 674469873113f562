//! Characteristic-backed publish slots

use ble_gatt::{CharacteristicConfig, CharacteristicFlags, CharacteristicHandle, Uuid16};
use obd_scheduler::{EncodedPayload, Metric, PublishSink};
use tracing::warn;

use crate::config::AdvertisingConfig;

/// Publishes a metric's payloads into its GATT characteristic
pub struct CharacteristicSink {
    metric: Metric,
    handle: CharacteristicHandle,
}

impl CharacteristicSink {
    pub fn new(metric: Metric, handle: CharacteristicHandle) -> Self {
        Self { metric, handle }
    }

    pub fn handle(&self) -> &CharacteristicHandle {
        &self.handle
    }
}

impl PublishSink for CharacteristicSink {
    fn publish(&self, payload: EncodedPayload) {
        if let Err(e) = self.handle.write(payload.as_bytes()) {
            warn!(
                metric = self.metric.name(),
                "Characteristic {} not updated: {}",
                self.handle.uuid(),
                e
            );
        }
    }
}

/// One characteristic declaration per metric, in [`Metric::ALL`] order.
///
/// Every metric gets a slot, enabled or not, so the client always finds the
/// full table. Values start at four zero bytes.
pub fn characteristic_configs(advertising: &AdvertisingConfig) -> Vec<(Metric, CharacteristicConfig)> {
    Metric::ALL
        .iter()
        .filter_map(|metric| {
            advertising
                .characteristics
                .get(metric)
                .map(|uuid| (*metric, characteristic_config(*uuid)))
        })
        .collect()
}

fn characteristic_config(uuid: Uuid16) -> CharacteristicConfig {
    CharacteristicConfig {
        uuid,
        initial_value: vec![0; EncodedPayload::LEN],
        flags: CharacteristicFlags::WRITE_WITHOUT_RESPONSE | CharacteristicFlags::NOTIFY,
    }
}
