//! OBD-II to BLE Dashboard Bridge
//!
//! Reads live engine telemetry from an ELM327 adapter and republishes every
//! metric as a four byte GATT characteristic for a dashboard app.

pub mod config;
pub mod error;
pub mod sink;
pub mod supervisor;

pub use config::BridgeConfig;
pub use error::BridgeError;
pub use supervisor::Supervisor;

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize logging. `RUST_LOG` overrides the default `info` level.
pub fn init_logging() -> Result<(), BridgeError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| BridgeError::Logging(e.to_string()))
}

/// Serve poll counters for Prometheus on `listen`
pub fn install_metrics_exporter(listen: &str) -> Result<(), BridgeError> {
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| BridgeError::Metrics(format!("invalid listen address {listen:?}: {e}")))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| BridgeError::Metrics(e.to_string()))?;
    info!("Prometheus exporter listening on {}", addr);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_rejects_bad_address() {
        assert!(matches!(
            install_metrics_exporter("not an address"),
            Err(BridgeError::Metrics(_))
        ));
    }
}
