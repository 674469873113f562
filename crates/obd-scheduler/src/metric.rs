//! Metric definitions
//!
//! The twelve telemetry quantities the bridge republishes, what to ask the
//! adapter for each of them and how the answer is turned into a payload.

use crate::scheduler::{MetricSettings, SchedulerConfig};
use obd_protocol::{Pid, PidResponse};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One telemetry quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Rpm,
    FuelLevel,
    CoolantTemp,
    EngineOilTemp,
    IntakeAirTemp,
    MafRate,
    Gear,
    Speed,
    AmbientTemp,
    ThrottlePosition,
    Odometer,
    BatteryVoltage,
}

impl Metric {
    /// Every metric, in publication order
    pub const ALL: [Metric; 12] = [
        Metric::Rpm,
        Metric::FuelLevel,
        Metric::CoolantTemp,
        Metric::EngineOilTemp,
        Metric::IntakeAirTemp,
        Metric::MafRate,
        Metric::Gear,
        Metric::Speed,
        Metric::AmbientTemp,
        Metric::ThrottlePosition,
        Metric::Odometer,
        Metric::BatteryVoltage,
    ];

    /// Short machine name, used in configuration keys and log fields
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Rpm => "rpm",
            Metric::FuelLevel => "fuel_level",
            Metric::CoolantTemp => "coolant_temp",
            Metric::EngineOilTemp => "engine_oil_temp",
            Metric::IntakeAirTemp => "intake_air_temp",
            Metric::MafRate => "maf_rate",
            Metric::Gear => "gear",
            Metric::Speed => "speed",
            Metric::AmbientTemp => "ambient_temp",
            Metric::ThrottlePosition => "throttle_position",
            Metric::Odometer => "odometer",
            Metric::BatteryVoltage => "battery_voltage",
        }
    }

    /// Human readable description for console output
    pub fn description(&self) -> &'static str {
        match self {
            Metric::Rpm => "engine speed",
            Metric::FuelLevel => "fuel level",
            Metric::CoolantTemp => "coolant temp",
            Metric::EngineOilTemp => "engine oil temp",
            Metric::IntakeAirTemp => "intake air temp",
            Metric::MafRate => "mass air flow rate",
            Metric::Gear => "current gear ratio",
            Metric::Speed => "current speed",
            Metric::AmbientTemp => "ambient temp",
            Metric::ThrottlePosition => "throttle position",
            Metric::Odometer => "current mileage",
            Metric::BatteryVoltage => "battery voltage",
        }
    }

    /// Unit of the published value
    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Rpm => " rpm",
            Metric::FuelLevel | Metric::ThrottlePosition => "%",
            Metric::CoolantTemp
            | Metric::EngineOilTemp
            | Metric::IntakeAirTemp
            | Metric::AmbientTemp => "\u{00b0}C",
            Metric::MafRate => " g/s",
            Metric::Gear => "",
            Metric::Speed => " km/h",
            Metric::Odometer => " km",
            Metric::BatteryVoltage => " V",
        }
    }

    /// What to ask the adapter for
    pub fn request(&self) -> Request {
        match self {
            Metric::Rpm => Request::Pid(Pid::Rpm),
            Metric::FuelLevel => Request::Pid(Pid::FuelLevel),
            Metric::CoolantTemp => Request::Pid(Pid::CoolantTemp),
            Metric::EngineOilTemp => Request::Pid(Pid::EngineOilTemp),
            Metric::IntakeAirTemp => Request::Pid(Pid::IntakeAirTemp),
            Metric::MafRate => Request::Pid(Pid::Maf),
            Metric::Gear => Request::Pid(Pid::ActualGear),
            Metric::Speed => Request::Pid(Pid::Speed),
            Metric::AmbientTemp => Request::Pid(Pid::AmbientTemp),
            Metric::ThrottlePosition => Request::Pid(Pid::ThrottlePosition),
            Metric::Odometer => Request::Pid(Pid::Odometer),
            Metric::BatteryVoltage => Request::BatteryVoltage,
        }
    }

    /// How a decoded reading becomes a payload
    pub fn transform(&self) -> Transform {
        match self {
            Metric::FuelLevel | Metric::ThrottlePosition => Transform::Scale(100.0),
            Metric::CoolantTemp
            | Metric::EngineOilTemp
            | Metric::IntakeAirTemp
            | Metric::AmbientTemp
            | Metric::Speed => Transform::Widen,
            Metric::Gear => Transform::RawPassthrough,
            Metric::Rpm | Metric::MafRate | Metric::Odometer | Metric::BatteryVoltage => {
                Transform::Scale(1.0)
            }
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A command to issue on the diagnostic channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Mode 01 PID query
    Pid(Pid),
    /// Adapter supply voltage read
    BatteryVoltage,
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Pid(pid) => write!(f, "PID {}", pid),
            Request::BatteryVoltage => f.write_str("battery voltage"),
        }
    }
}

/// Decode-to-encode rule
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// Multiply by the factor, then store as f32
    Scale(f32),
    /// Integer quantity: truncate toward zero, then store as f32
    Widen,
    /// Forward the adapter's raw reply bytes
    RawPassthrough,
}

/// A decoded answer from the channel
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Decoded numeric value
    pub value: f64,
    /// Payload bytes as sent by the vehicle (empty for non-PID reads)
    pub raw_bytes: Vec<u8>,
}

impl Reading {
    /// A reading with no raw payload
    pub fn number(value: f64) -> Self {
        Self {
            value,
            raw_bytes: Vec::new(),
        }
    }
}

impl From<PidResponse> for Reading {
    fn from(response: PidResponse) -> Self {
        Self {
            value: response.value,
            raw_bytes: response.raw_bytes,
        }
    }
}

/// Immutable description of one poller
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDefinition {
    pub metric: Metric,
    pub request: Request,
    pub transform: Transform,
    pub interval: Duration,
    pub enabled: bool,
}

impl MetricDefinition {
    /// Build the definition of `metric` with the given cadence settings
    pub fn new(metric: Metric, settings: &MetricSettings) -> Self {
        Self {
            metric,
            request: metric.request(),
            transform: metric.transform(),
            interval: Duration::from_millis(settings.interval_ms),
            enabled: settings.enabled,
        }
    }

    /// All twelve definitions, enabled or not
    pub fn table(config: &SchedulerConfig) -> Vec<MetricDefinition> {
        Metric::ALL
            .iter()
            .map(|metric| MetricDefinition::new(*metric, config.settings(*metric)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_covers_every_metric_once() {
        let table = MetricDefinition::table(&SchedulerConfig::default());
        assert_eq!(table.len(), 12);
        let metrics: HashSet<_> = table.iter().map(|d| d.metric).collect();
        assert_eq!(metrics.len(), 12);
    }

    #[test]
    fn test_requests_are_distinct() {
        let requests: Vec<_> = Metric::ALL.iter().map(|m| m.request()).collect();
        for (i, a) in requests.iter().enumerate() {
            assert!(!requests[i + 1..].contains(a), "{a} requested twice");
        }
    }

    #[test]
    fn test_fast_metrics_poll_more_often() {
        let table = MetricDefinition::table(&SchedulerConfig::default());
        let interval = |metric: Metric| {
            table
                .iter()
                .find(|d| d.metric == metric)
                .map(|d| d.interval)
                .unwrap()
        };
        assert!(interval(Metric::Rpm) * 10 <= interval(Metric::FuelLevel));
        assert!(interval(Metric::Speed) * 10 <= interval(Metric::BatteryVoltage));
        assert!(interval(Metric::ThrottlePosition) * 10 <= interval(Metric::Odometer));
    }

    #[test]
    fn test_voltage_is_not_a_pid() {
        assert_eq!(Metric::BatteryVoltage.request(), Request::BatteryVoltage);
        assert_eq!(Metric::Gear.transform(), Transform::RawPassthrough);
    }
}
