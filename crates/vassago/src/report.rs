//! Combined performance report

use crate::Result;
use serde::{Deserialize, Serialize};
use vassago_core::{Capabilities, CoreError, DeviceSnapshot, NetworkSnapshot};

/// Point-in-time view of everything the controller knows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Device snapshot
    pub device: DeviceSnapshot,
    /// Network snapshot
    pub network: NetworkSnapshot,
    /// Platform APIs detected at construction
    pub capabilities: Capabilities,
    /// Recommended concurrency
    pub concurrency: u32,
    /// Current batch size
    pub batch_size: u32,
    /// `0.6 * hardware score + 0.4 * network quality`, 0 - 100
    pub overall_score: f64,
}

impl PerformanceReport {
    /// Build a report from snapshots and governor outputs
    pub fn new(
        device: DeviceSnapshot,
        network: NetworkSnapshot,
        capabilities: Capabilities,
        concurrency: u32,
        batch_size: u32,
    ) -> Self {
        let overall_score = overall_score(&device, &network);
        Self {
            device,
            network,
            capabilities,
            concurrency,
            batch_size,
            overall_score,
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self).map_err(CoreError::from)?)
    }
}

/// Overall capability score
pub fn overall_score(device: &DeviceSnapshot, network: &NetworkSnapshot) -> f64 {
    (0.6 * device.hardware_score + 0.4 * network.quality_score()).clamp(0.0, 100.0)
}
