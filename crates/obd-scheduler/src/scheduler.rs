//! Per-metric cadence configuration

use crate::metric::Metric;
use serde::{Deserialize, Serialize};

/// Cadence and enablement of a single metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSettings {
    /// Poll interval in milliseconds
    pub interval_ms: u64,
    /// Whether a poller is started for the metric
    pub enabled: bool,
}

impl MetricSettings {
    /// Enabled metric polled every `interval_ms`
    pub const fn every(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            enabled: true,
        }
    }

    /// Metric that is known to answer unreliably; off unless configured
    pub const fn disabled(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            enabled: false,
        }
    }
}

/// Configuration for the metric pollers
///
/// Fast-changing quantities (RPM, speed, throttle) poll 10 to 20 times more
/// often than slow ones (fuel, odometer, voltage) to spare bus bandwidth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub rpm: MetricSettings,
    pub fuel_level: MetricSettings,
    pub coolant_temp: MetricSettings,
    /// Answers with an ECHO mismatch on the reference vehicle
    pub engine_oil_temp: MetricSettings,
    pub intake_air_temp: MetricSettings,
    pub maf_rate: MetricSettings,
    /// Answers NO DATA on the reference vehicle
    pub gear: MetricSettings,
    pub speed: MetricSettings,
    pub ambient_temp: MetricSettings,
    pub throttle_position: MetricSettings,
    /// Reads implausibly high on the reference vehicle
    pub odometer: MetricSettings,
    pub battery_voltage: MetricSettings,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            rpm: MetricSettings::every(100),
            fuel_level: MetricSettings::every(5000),
            coolant_temp: MetricSettings::every(500),
            engine_oil_temp: MetricSettings::disabled(500),
            intake_air_temp: MetricSettings::every(500),
            maf_rate: MetricSettings::every(500),
            gear: MetricSettings::disabled(250),
            speed: MetricSettings::every(100),
            ambient_temp: MetricSettings::every(5000),
            throttle_position: MetricSettings::every(250),
            odometer: MetricSettings::disabled(5000),
            battery_voltage: MetricSettings::every(5000),
        }
    }
}

impl SchedulerConfig {
    /// Settings of one metric
    pub fn settings(&self, metric: Metric) -> &MetricSettings {
        match metric {
            Metric::Rpm => &self.rpm,
            Metric::FuelLevel => &self.fuel_level,
            Metric::CoolantTemp => &self.coolant_temp,
            Metric::EngineOilTemp => &self.engine_oil_temp,
            Metric::IntakeAirTemp => &self.intake_air_temp,
            Metric::MafRate => &self.maf_rate,
            Metric::Gear => &self.gear,
            Metric::Speed => &self.speed,
            Metric::AmbientTemp => &self.ambient_temp,
            Metric::ThrottlePosition => &self.throttle_position,
            Metric::Odometer => &self.odometer,
            Metric::BatteryVoltage => &self.battery_voltage,
        }
    }

    /// Mutable settings of one metric
    pub fn settings_mut(&mut self, metric: Metric) -> &mut MetricSettings {
        match metric {
            Metric::Rpm => &mut self.rpm,
            Metric::FuelLevel => &mut self.fuel_level,
            Metric::CoolantTemp => &mut self.coolant_temp,
            Metric::EngineOilTemp => &mut self.engine_oil_temp,
            Metric::IntakeAirTemp => &mut self.intake_air_temp,
            Metric::MafRate => &mut self.maf_rate,
            Metric::Gear => &mut self.gear,
            Metric::Speed => &mut self.speed,
            Metric::AmbientTemp => &mut self.ambient_temp,
            Metric::ThrottlePosition => &mut self.throttle_position,
            Metric::Odometer => &mut self.odometer,
            Metric::BatteryVoltage => &mut self.battery_voltage,
        }
    }

    /// Metrics whose poller will be started
    pub fn enabled_metrics(&self) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|metric| self.settings(*metric).enabled)
            .collect()
    }
}
