//! In-process peripheral
//!
//! Keeps the GATT table in memory and enforces the same ordering rules as a
//! real controller: the radio comes first, services are registered before
//! advertising starts, characteristic identifiers are unique.

use crate::error::GattError;
use crate::peripheral::{CharacteristicConfig, CharacteristicHandle, PeripheralStack};
use crate::uuid::Uuid16;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// Longest local name that fits a legacy advertising packet
pub const MAX_LOCAL_NAME_LEN: usize = 29;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Advertisement {
    local_name: String,
    services: Vec<Uuid16>,
}

#[derive(Default)]
struct State {
    radio_enabled: bool,
    advertisement: Option<Advertisement>,
    advertising: bool,
    services: BTreeMap<Uuid16, Vec<CharacteristicHandle>>,
}

/// Peripheral whose GATT table lives in this process
pub struct LocalPeripheral {
    radio_available: bool,
    state: Mutex<State>,
}

impl Default for LocalPeripheral {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalPeripheral {
    /// Create a peripheral with a working radio
    pub fn new() -> Self {
        Self {
            radio_available: true,
            state: Mutex::new(State::default()),
        }
    }

    /// Create a peripheral whose radio refuses to power on
    pub fn without_radio() -> Self {
        Self {
            radio_available: false,
            state: Mutex::new(State::default()),
        }
    }

    /// Whether advertising has started
    pub fn is_advertising(&self) -> bool {
        self.state().advertising
    }

    /// Advertised local name, once configured
    pub fn local_name(&self) -> Option<String> {
        self.state()
            .advertisement
            .as_ref()
            .map(|adv| adv.local_name.clone())
    }

    /// Look up a registered characteristic in any service
    pub fn characteristic(&self, uuid: Uuid16) -> Option<CharacteristicHandle> {
        self.state()
            .services
            .values()
            .flatten()
            .find(|handle| handle.uuid() == uuid)
            .cloned()
    }

    /// Identifiers of the registered services
    pub fn services(&self) -> Vec<Uuid16> {
        self.state().services.keys().copied().collect()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PeripheralStack for LocalPeripheral {
    async fn enable_radio(&self) -> Result<(), GattError> {
        if !self.radio_available {
            return Err(GattError::RadioUnavailable("no controller present".into()));
        }
        self.state().radio_enabled = true;
        info!("Bluetooth radio enabled");
        Ok(())
    }

    async fn configure_advertisement(
        &self,
        local_name: &str,
        services: &[Uuid16],
    ) -> Result<(), GattError> {
        let mut state = self.state();
        if !state.radio_enabled {
            return Err(GattError::RadioDisabled);
        }
        if local_name.is_empty() || local_name.len() > MAX_LOCAL_NAME_LEN {
            return Err(GattError::InvalidAdvertisement(format!(
                "local name must be 1..={} bytes, got {:?}",
                MAX_LOCAL_NAME_LEN, local_name
            )));
        }
        state.advertisement = Some(Advertisement {
            local_name: local_name.to_string(),
            services: services.to_vec(),
        });
        Ok(())
    }

    async fn start_advertisement(&self) -> Result<(), GattError> {
        let mut state = self.state();
        if !state.radio_enabled {
            return Err(GattError::RadioDisabled);
        }
        let adv = state
            .advertisement
            .clone()
            .ok_or(GattError::AdvertisementNotConfigured)?;
        state.advertising = true;
        info!("Advertising {:?} with services {:?}", adv.local_name, adv.services);
        Ok(())
    }

    async fn register_service(
        &self,
        service: Uuid16,
        characteristics: Vec<CharacteristicConfig>,
    ) -> Result<Vec<CharacteristicHandle>, GattError> {
        let mut state = self.state();
        if !state.radio_enabled {
            return Err(GattError::RadioDisabled);
        }
        if state.advertising {
            return Err(GattError::AlreadyAdvertising(service));
        }

        let mut seen: Vec<Uuid16> = state
            .services
            .values()
            .flatten()
            .map(CharacteristicHandle::uuid)
            .collect();
        for config in &characteristics {
            if seen.contains(&config.uuid) {
                return Err(GattError::DuplicateCharacteristic(config.uuid));
            }
            seen.push(config.uuid);
        }

        let handles: Vec<CharacteristicHandle> = characteristics
            .into_iter()
            .map(CharacteristicHandle::new)
            .collect();
        state
            .services
            .entry(service)
            .or_default()
            .extend(handles.iter().cloned());
        info!(
            "Registered service {} ({}) with {} characteristic(s)",
            service,
            service.to_uuid(),
            handles.len()
        );
        Ok(handles)
    }
}
