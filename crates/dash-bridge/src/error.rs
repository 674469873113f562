//! Bridge Error Types

use ble_gatt::GattError;
use obd_protocol::ObdError;
use thiserror::Error;

/// Errors that stop the bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Logging could not be initialized
    #[error("Logging initialization failed: {0}")]
    Logging(String),

    /// Metrics exporter could not be installed
    #[error("Metrics exporter failed: {0}")]
    Metrics(String),

    /// The Bluetooth radio could not be enabled
    #[error("Bluetooth radio could not be enabled: {0}")]
    Radio(#[source] GattError),

    /// The GATT service could not be registered
    #[error("GATT service registration failed: {0}")]
    Service(#[source] GattError),

    /// Advertising could not be configured or started
    #[error("Advertising failed: {0}")]
    Advertisement(#[source] GattError),

    /// No adapter found on any candidate device path
    #[error("OBD adapter discovery failed: {0}")]
    Discovery(#[source] ObdError),

    /// The diagnostic session went away while running
    #[error("Diagnostic session lost: {0}")]
    SessionLost(#[source] ObdError),
}

impl From<config::ConfigError> for BridgeError {
    fn from(err: config::ConfigError) -> Self {
        BridgeError::Config(err.to_string())
    }
}
