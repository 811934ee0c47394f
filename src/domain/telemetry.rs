// Telemetry domain models - one UPS status snapshot and its chart projections
use serde::{Deserialize, Serialize};

/// Decoded status bits reported alongside every sample.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFlags {
    pub raw: String,
    pub utility_fail: bool,
    pub battery_low: bool,
    pub bypass_active: bool,
    pub ups_failed: bool,
    pub ups_is_standby: bool,
    pub test_in_progress: bool,
    pub shutdown_active: bool,
    pub beeper_on: bool,
}

/// One telemetry snapshot as delivered by the backend.
///
/// The `timestamp` is an opaque source-assigned string. It is intended to be
/// monotonic but the backend may re-deliver a sample with an unchanged
/// timestamp, which is why the rolling buffers deduplicate against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsSample {
    pub r#type: String,
    pub input_voltage: f64,
    pub fault_voltage: f64,
    pub output_voltage: f64,
    pub load_percent: u64,
    pub frequency: f64,
    pub battery_voltage: f64,
    pub temperature: f64,
    pub battery_percent: u64,
    pub estimated_runtime: u64,
    pub timestamp: String,
    pub status: StatusFlags,
}

/// Four-field projection driving the main dashboard chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub timestamp: String,
    pub input_voltage: f64,
    pub output_voltage: f64,
    pub load_percent: u64,
    pub battery_percent: u64,
}

impl From<&UpsSample> for ChartPoint {
    fn from(sample: &UpsSample) -> Self {
        Self {
            timestamp: sample.timestamp.clone(),
            input_voltage: sample.input_voltage,
            output_voltage: sample.output_voltage,
            load_percent: sample.load_percent,
            battery_percent: sample.battery_percent,
        }
    }
}

/// Voltage-only projection for the longer input-voltage trend chart.
#[derive(Debug, Clone, PartialEq)]
pub struct VoltagePoint {
    pub timestamp: String,
    pub input_voltage: f64,
}

impl From<&UpsSample> for VoltagePoint {
    fn from(sample: &UpsSample) -> Self {
        Self {
            timestamp: sample.timestamp.clone(),
            input_voltage: sample.input_voltage,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_at(timestamp: &str) -> UpsSample {
    UpsSample {
        r#type: "status".to_string(),
        input_voltage: 229.4,
        fault_voltage: 0.0,
        output_voltage: 230.1,
        load_percent: 37,
        frequency: 50.0,
        battery_voltage: 13.6,
        temperature: 28.5,
        battery_percent: 98,
        estimated_runtime: 42,
        timestamp: timestamp.to_string(),
        status: StatusFlags::default(),
    }
}
