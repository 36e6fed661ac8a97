//! Snapshot, sample and audit types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse device class used to pick baselines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceType {
    /// Phone-class device
    Mobile,
    /// Tablet-class device
    Tablet,
    /// Desktop or laptop
    #[default]
    Desktop,
    /// Constrained hardware of any form factor
    LowEnd,
}

impl DeviceType {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Desktop => "desktop",
            DeviceType::LowEnd => "low-end",
        }
    }

    /// Classify a device that did not report its form factor
    pub fn classify(cpu_cores: u32, memory_gb: Option<f64>) -> Self {
        let constrained_memory = memory_gb.map_or(false, |gb| gb <= 2.0);
        if cpu_cores <= 2 || constrained_memory {
            DeviceType::LowEnd
        } else {
            DeviceType::Desktop
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse network quality classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EffectiveType {
    #[serde(rename = "4g")]
    FourG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "slow-2g")]
    Slow2G,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl EffectiveType {
    /// Classify a measured bandwidth in Mbps
    pub fn from_bandwidth(mbps: f64) -> Self {
        if mbps > 5.0 {
            EffectiveType::FourG
        } else if mbps > 1.0 {
            EffectiveType::ThreeG
        } else if mbps > 0.3 {
            EffectiveType::TwoG
        } else {
            EffectiveType::Slow2G
        }
    }

    /// Parse a platform-reported name, falling back to `Unknown`
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "4g" => EffectiveType::FourG,
            "3g" => EffectiveType::ThreeG,
            "2g" => EffectiveType::TwoG,
            "slow-2g" => EffectiveType::Slow2G,
            _ => EffectiveType::Unknown,
        }
    }

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectiveType::FourG => "4g",
            EffectiveType::ThreeG => "3g",
            EffectiveType::TwoG => "2g",
            EffectiveType::Slow2G => "slow-2g",
            EffectiveType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EffectiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Battery state as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryStatus {
    /// Charge level (0.0 - 1.0)
    pub level: f64,
    /// Whether external power is connected
    pub charging: bool,
}

impl BatteryStatus {
    /// Create a battery status, clamping the level into `[0, 1]`
    pub fn new(level: f64, charging: bool) -> Self {
        let level = if level.is_finite() { level.clamp(0.0, 1.0) } else { 1.0 };
        Self { level, charging }
    }

    /// True when running on battery below `threshold`
    pub fn is_discharging_below(&self, threshold: f64) -> bool {
        !self.charging && self.level < threshold
    }
}

/// Device capability snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// CPU score from core count (0 - 100)
    pub cpu_score: f64,
    /// Memory score from device memory (0 - 100)
    pub memory_score: f64,
    /// Composite hardware score (0 - 100)
    pub hardware_score: f64,
    /// Device class
    pub device_type: DeviceType,
    /// Logical CPU cores (>= 1)
    pub cpu_cores: u32,
    /// Battery state, if the platform exposes one
    pub battery: Option<BatteryStatus>,
    /// Whether `hardware_score` came from a completed microbenchmark
    pub calibrated: bool,
}

impl Default for DeviceSnapshot {
    fn default() -> Self {
        Self {
            cpu_score: 50.0,
            memory_score: 70.0,
            hardware_score: 60.0,
            device_type: DeviceType::Desktop,
            cpu_cores: 4,
            battery: None,
            calibrated: false,
        }
    }
}

/// Network quality snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    /// Platform connection type (wifi, cellular, ...)
    pub connection_type: String,
    /// Downlink estimate in Mbps
    pub downlink_mbps: f64,
    /// Round-trip time in ms
    pub rtt_ms: f64,
    /// Effective type classification
    pub effective_type: EffectiveType,
    /// When the snapshot was last refreshed (unix ms)
    pub last_measured: Option<u64>,
}

impl NetworkSnapshot {
    /// Coarse quality score (0 - 100) for reporting
    pub fn quality_score(&self) -> f64 {
        match self.effective_type {
            EffectiveType::FourG => 100.0,
            EffectiveType::ThreeG => 70.0,
            EffectiveType::TwoG => 40.0,
            EffectiveType::Slow2G => 20.0,
            EffectiveType::Unknown => 50.0,
        }
    }
}

impl Default for NetworkSnapshot {
    fn default() -> Self {
        Self {
            connection_type: "unknown".to_string(),
            downlink_mbps: 0.0,
            rtt_ms: 0.0,
            effective_type: EffectiveType::Unknown,
            last_measured: None,
        }
    }
}

/// Outcome of one load wave, reported by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    /// When the wave completed (unix ms)
    pub timestamp: u64,
    /// Batch size or concurrency used for the wave
    pub batch_size: u32,
    /// Wall time of the wave in ms
    pub load_time_ms: f64,
    /// Fraction of resources loaded successfully (0.0 - 1.0)
    pub success_rate: f64,
    /// Number of resources in the wave
    pub resource_count: u32,
}

impl PerformanceSample {
    /// Create a sample stamped with the current time
    pub fn new(batch_size: u32, load_time_ms: f64, success_rate: f64, resource_count: u32) -> Self {
        let success_rate = if success_rate.is_finite() {
            success_rate.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let load_time_ms = if load_time_ms.is_finite() { load_time_ms.max(0.0) } else { 0.0 };

        Self {
            timestamp: now_ms(),
            batch_size,
            load_time_ms,
            success_rate,
            resource_count,
        }
    }

    /// Override the timestamp
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// One governor recomputation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentRecord<F> {
    /// When the recomputation ran (unix ms)
    pub timestamp: u64,
    /// Value before the recomputation
    pub old_value: u32,
    /// Value after the recomputation
    pub new_value: u32,
    /// Factor breakdown that produced `new_value`
    pub factors: F,
}

impl<F> AdjustmentRecord<F> {
    /// Create a record stamped with the current time
    pub fn new(old_value: u32, new_value: u32, factors: F) -> Self {
        Self {
            timestamp: now_ms(),
            old_value,
            new_value,
            factors,
        }
    }

    /// Signed change applied by this recomputation
    pub fn delta(&self) -> i64 {
        self.new_value as i64 - self.old_value as i64
    }
}

/// Current unix time in milliseconds
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_type_thresholds() {
        assert_eq!(EffectiveType::from_bandwidth(10.0), EffectiveType::FourG);
        assert_eq!(EffectiveType::from_bandwidth(5.0), EffectiveType::ThreeG);
        assert_eq!(EffectiveType::from_bandwidth(1.0), EffectiveType::TwoG);
        assert_eq!(EffectiveType::from_bandwidth(0.3), EffectiveType::Slow2G);
        assert_eq!(EffectiveType::from_bandwidth(0.0), EffectiveType::Slow2G);
    }

    #[test]
    fn test_effective_type_serde_names() {
        let json = serde_json::to_string(&EffectiveType::Slow2G).unwrap();
        assert_eq!(json, "\"slow-2g\"");
        let parsed: EffectiveType = serde_json::from_str("\"4g\"").unwrap();
        assert_eq!(parsed, EffectiveType::FourG);
        assert_eq!(EffectiveType::parse(" 3G "), EffectiveType::ThreeG);
        assert_eq!(EffectiveType::parse("5g"), EffectiveType::Unknown);
    }

    #[test]
    fn test_device_type_serde_names() {
        let json = serde_json::to_string(&DeviceType::LowEnd).unwrap();
        assert_eq!(json, "\"low-end\"");
        assert_eq!(DeviceType::LowEnd.to_string(), "low-end");
    }

    #[test]
    fn test_device_classification() {
        assert_eq!(DeviceType::classify(2, Some(8.0)), DeviceType::LowEnd);
        assert_eq!(DeviceType::classify(8, Some(2.0)), DeviceType::LowEnd);
        assert_eq!(DeviceType::classify(8, None), DeviceType::Desktop);
    }

    #[test]
    fn test_battery_clamps_level() {
        assert_eq!(BatteryStatus::new(1.7, false).level, 1.0);
        assert_eq!(BatteryStatus::new(-0.5, false).level, 0.0);
        assert!(BatteryStatus::new(0.1, false).is_discharging_below(0.2));
        assert!(!BatteryStatus::new(0.1, true).is_discharging_below(0.2));
    }

    #[test]
    fn test_sample_sanitizes_inputs() {
        let sample = PerformanceSample::new(10, -5.0, 1.4, 10);
        assert_eq!(sample.load_time_ms, 0.0);
        assert_eq!(sample.success_rate, 1.0);

        let sample = PerformanceSample::new(10, f64::NAN, f64::NAN, 10);
        assert_eq!(sample.load_time_ms, 0.0);
        assert_eq!(sample.success_rate, 0.0);
    }

    #[test]
    fn test_adjustment_delta() {
        let record = AdjustmentRecord::new(20, 15, ());
        assert_eq!(record.delta(), -5);
    }

    #[test]
    fn test_network_quality_ordering() {
        let mut snapshot = NetworkSnapshot::default();
        let mut last = f64::MAX;
        for ty in [
            EffectiveType::FourG,
            EffectiveType::ThreeG,
            EffectiveType::TwoG,
            EffectiveType::Slow2G,
        ] {
            snapshot.effective_type = ty;
            assert!(snapshot.quality_score() < last);
            last = snapshot.quality_score();
        }
    }
}
