//! Bridge configuration
//!
//! The compiled-in defaults describe the reference installation. An optional
//! TOML file and `DASH_BRIDGE__`-prefixed environment variables are layered
//! on top of them.

use crate::error::BridgeError;
use ble_gatt::{units, Uuid16, MAX_LOCAL_NAME_LEN, SERVICE_HUMAN_INTERFACE_DEVICE};
use config::{Config, Environment, File, FileFormat};
use obd_protocol::{DiscoveryPolicy, ObdProtocol, SerialConnector, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS};
use obd_scheduler::{Metric, SchedulerConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default location of the optional configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/dash-bridge/config.toml";

/// Environment variable overriding [`DEFAULT_CONFIG_PATH`]
pub const CONFIG_PATH_ENV: &str = "DASH_BRIDGE_CONFIG";

/// Serial adapter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Device paths tried in order
    pub candidates: Vec<String>,
    pub baud_rate: u32,
    pub command_timeout_ms: u64,
    pub protocol: ObdProtocol,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            candidates: DiscoveryPolicy::default().candidates,
            baud_rate: DEFAULT_BAUD_RATE,
            command_timeout_ms: DEFAULT_TIMEOUT_MS,
            protocol: ObdProtocol::Auto,
        }
    }
}

/// How long to keep looking for the adapter at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Full passes over the candidates before giving up
    pub rounds: u32,
    /// Pause between passes
    pub backoff_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let policy = DiscoveryPolicy::default();
        Self {
            rounds: policy.rounds,
            backoff_ms: policy.backoff.as_millis() as u64,
        }
    }
}

/// What the peripheral advertises and serves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvertisingConfig {
    pub local_name: String,
    pub service: Uuid16,
    /// Characteristic identifier of every metric
    pub characteristics: BTreeMap<Metric, Uuid16>,
}

impl Default for AdvertisingConfig {
    fn default() -> Self {
        Self {
            local_name: "Raspberry Pi OBD-II".to_string(),
            service: SERVICE_HUMAN_INTERFACE_DEVICE,
            characteristics: default_characteristics(),
        }
    }
}

/// Identifiers the companion dashboard app subscribes to
fn default_characteristics() -> BTreeMap<Metric, Uuid16> {
    BTreeMap::from([
        (Metric::Rpm, units::REVOLUTIONS_PER_MINUTE),
        (Metric::CoolantTemp, units::DEGREE_CELSIUS),
        (Metric::IntakeAirTemp, Uuid16(0x2730)),
        (Metric::Speed, units::VELOCITY),
        (Metric::AmbientTemp, Uuid16(0x2731)),
        (Metric::FuelLevel, units::PERCENTAGE),
        (Metric::MafRate, units::MASS_FLOW),
        (Metric::ThrottlePosition, Uuid16(0x27AE)),
        (Metric::BatteryVoltage, Uuid16(0x2B18)),
        (Metric::Odometer, units::DISTANCE),
        (Metric::EngineOilTemp, Uuid16(0x2732)),
        (Metric::Gear, Uuid16(0x2C08)),
    ])
}

/// Optional observability endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Address for the Prometheus scrape endpoint, e.g. "0.0.0.0:9100"
    pub prometheus_listen: Option<String>,
}

/// Complete bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub adapter: AdapterConfig,
    pub discovery: DiscoveryConfig,
    pub advertising: AdvertisingConfig,
    pub scheduler: SchedulerConfig,
    pub telemetry: TelemetryConfig,
}

impl BridgeConfig {
    /// Load defaults, the optional file and the environment, then validate
    pub fn load() -> Result<Self, BridgeError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        Self::layered(
            File::from(path).format(FileFormat::Toml).required(false),
            Self::environment(),
        )
    }

    /// Overlay a TOML document on the defaults, then validate
    pub fn from_toml(text: &str) -> Result<Self, BridgeError> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// `DASH_BRIDGE__ADAPTER__BAUD_RATE=115200` style overrides. Device
    /// candidates are a comma separated list.
    pub fn environment() -> Environment {
        Environment::with_prefix("DASH_BRIDGE")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("adapter.candidates")
    }

    fn layered<F>(file: F, env: Environment) -> Result<Self, BridgeError>
    where
        F: config::Source + Send + Sync + 'static,
    {
        let config: Self = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the bridge cannot run with
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.adapter.candidates.is_empty() {
            return Err(BridgeError::Config("no adapter device candidates".into()));
        }

        let name = &self.advertising.local_name;
        if name.is_empty() || name.len() > MAX_LOCAL_NAME_LEN {
            return Err(BridgeError::Config(format!(
                "advertised name must be 1..={} bytes, got {:?}",
                MAX_LOCAL_NAME_LEN, name
            )));
        }

        let mut seen = Vec::new();
        for metric in Metric::ALL {
            let uuid = self.advertising.characteristics.get(&metric).ok_or_else(|| {
                BridgeError::Config(format!("no characteristic identifier for {metric}"))
            })?;
            if seen.contains(uuid) {
                return Err(BridgeError::Config(format!(
                    "characteristic {uuid} assigned to more than one metric"
                )));
            }
            seen.push(*uuid);

            let settings = self.scheduler.settings(metric);
            if settings.enabled && settings.interval_ms == 0 {
                return Err(BridgeError::Config(format!("{metric} has a zero poll interval")));
            }
        }

        if self.scheduler.enabled_metrics().is_empty() {
            return Err(BridgeError::Config("every metric is disabled".into()));
        }
        Ok(())
    }

    /// Connector for the configured serial settings
    pub fn connector(&self) -> SerialConnector {
        SerialConnector {
            baud_rate: self.adapter.baud_rate,
            timeout: Duration::from_millis(self.adapter.command_timeout_ms),
            protocol: self.adapter.protocol,
        }
    }

    /// Discovery policy for the configured candidates
    pub fn discovery_policy(&self) -> DiscoveryPolicy {
        DiscoveryPolicy {
            candidates: self.adapter.candidates.clone(),
            rounds: self.discovery.rounds,
            backoff: Duration::from_millis(self.discovery.backoff_ms),
        }
    }
}
