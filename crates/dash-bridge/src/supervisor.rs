//! Bridge Supervisor
//!
//! Brings the bridge up in a fixed order: radio, adapter, GATT service,
//! advertising, pollers. Any failure before the pollers start aborts startup
//! and leaves no poller running.

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::sink::{characteristic_configs, CharacteristicSink};
use ble_gatt::{CharacteristicHandle, PeripheralStack};
use obd_protocol::{discover, Connector, ObdError};
use obd_scheduler::{ChannelArbiter, Metric, MetricDefinition, MetricPoller};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Running bridge
pub struct Supervisor {
    device: String,
    characteristics: BTreeMap<Metric, CharacteristicHandle>,
    pollers: JoinSet<(Metric, Result<(), ObdError>)>,
}

impl Supervisor {
    /// Bring up the bridge and spawn one poller per enabled metric
    pub async fn start<P, C>(
        config: &BridgeConfig,
        peripheral: &P,
        connector: &C,
    ) -> Result<Self, BridgeError>
    where
        P: PeripheralStack + ?Sized,
        C: Connector,
    {
        peripheral.enable_radio().await.map_err(BridgeError::Radio)?;

        let (device, transport) = discover(connector, &config.discovery_policy())
            .await
            .map_err(BridgeError::Discovery)?;

        let advertising = &config.advertising;
        let (metrics, declarations): (Vec<Metric>, Vec<_>) =
            characteristic_configs(advertising).into_iter().unzip();
        let handles = peripheral
            .register_service(advertising.service, declarations)
            .await
            .map_err(BridgeError::Service)?;
        let characteristics: BTreeMap<Metric, CharacteristicHandle> =
            metrics.into_iter().zip(handles).collect();

        peripheral
            .configure_advertisement(&advertising.local_name, &[advertising.service])
            .await
            .map_err(BridgeError::Advertisement)?;
        peripheral
            .start_advertisement()
            .await
            .map_err(BridgeError::Advertisement)?;

        let arbiter = Arc::new(ChannelArbiter::new(device.clone(), transport));
        let mut pollers = JoinSet::new();
        for definition in MetricDefinition::table(&config.scheduler) {
            if !definition.enabled {
                info!(metric = definition.metric.name(), "Metric disabled, slot stays idle");
                continue;
            }
            let Some(handle) = characteristics.get(&definition.metric) else {
                warn!(metric = definition.metric.name(), "No characteristic registered");
                continue;
            };

            let metric = definition.metric;
            let sink = Arc::new(CharacteristicSink::new(metric, handle.clone()));
            let poller = MetricPoller::new(definition, arbiter.clone(), sink);
            pollers.spawn(async move { (metric, poller.run().await) });
        }

        info!(
            "Bridge running on {} with {} poller(s)",
            device,
            pollers.len()
        );
        Ok(Self {
            device,
            characteristics,
            pollers,
        })
    }

    /// Device path of the diagnostic session
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Number of pollers still running
    pub fn poller_count(&self) -> usize {
        self.pollers.len()
    }

    /// Characteristic serving `metric`
    pub fn characteristic(&self, metric: Metric) -> Option<&CharacteristicHandle> {
        self.characteristics.get(&metric)
    }

    /// Wait until every poller has ended.
    ///
    /// Pollers only end when the diagnostic session is lost, which is
    /// returned so the process can exit and be restarted.
    pub async fn wait(&mut self) -> Result<(), BridgeError> {
        let mut lost = None;
        while let Some(joined) = self.pollers.join_next().await {
            match joined {
                Ok((metric, Ok(()))) => info!(metric = metric.name(), "Poller finished"),
                Ok((metric, Err(e))) => {
                    warn!(metric = metric.name(), "Poller ended: {}", e);
                    if lost.is_none() && e.is_session_lost() {
                        lost = Some(e);
                    }
                }
                Err(e) => error!("Poller task failed: {}", e),
            }
        }

        match lost {
            Some(e) => Err(BridgeError::SessionLost(e)),
            None => Ok(()),
        }
    }

    /// Stop every poller
    pub async fn shutdown(mut self) {
        self.pollers.abort_all();
        while self.pollers.join_next().await.is_some() {}
        info!("Bridge on {} stopped", self.device);
    }
}
