//! OBD-II to BLE Dashboard Bridge - Main Entry Point

use anyhow::Context;
use ble_gatt::LocalPeripheral;
use dash_bridge::{init_logging, install_metrics_exporter, BridgeConfig, Supervisor};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    info!("=== Dash Bridge v{} ===", env!("CARGO_PKG_VERSION"));

    let config = BridgeConfig::load().context("loading configuration")?;
    if let Some(listen) = &config.telemetry.prometheus_listen {
        install_metrics_exporter(listen)?;
    }

    let peripheral = LocalPeripheral::new();
    let connector = config.connector();
    let mut supervisor = Supervisor::start(&config, &peripheral, &connector)
        .await
        .context("starting bridge")?;

    let finished = tokio::select! {
        result = supervisor.wait() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match finished {
        Some(result) => result.context("bridge stopped")?,
        None => {
            info!("Shutdown requested");
            supervisor.shutdown().await;
        }
    }

    Ok(())
}
