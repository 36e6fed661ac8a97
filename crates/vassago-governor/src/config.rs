//! Governor configuration

use crate::{GovernorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;
use vassago_core::{CoreError, DeviceType};

/// Concurrency governor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Lower bound on recommended concurrency
    pub min_concurrency: u32,
    /// Upper bound on recommended concurrency
    pub max_concurrency: u32,
    /// Recomputation period in ms
    pub update_interval_ms: u64,
    /// Weight of the device recommendation
    pub device_weight: f64,
    /// Weight of the network recommendation
    pub network_weight: f64,
    /// Performance samples kept
    pub performance_history_size: usize,
    /// Adjustment records kept
    pub adjustment_history_size: usize,
    /// Recompute on a timer once started
    pub enable_auto_update: bool,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            min_concurrency: 2,
            max_concurrency: 16,
            update_interval_ms: 10_000,
            device_weight: 0.3,
            network_weight: 0.6,
            performance_history_size: 10,
            adjustment_history_size: 20,
            enable_auto_update: true,
        }
    }
}

impl ConcurrencyConfig {
    /// Parse from JSON, filling gaps with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(CoreError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Set concurrency bounds
    pub fn with_bounds(mut self, min: u32, max: u32) -> Self {
        self.min_concurrency = min;
        self.max_concurrency = max;
        self
    }

    /// Set recomputation period
    pub fn with_update_interval_ms(mut self, ms: u64) -> Self {
        self.update_interval_ms = ms;
        self
    }

    /// Enable or disable the timer
    pub fn with_auto_update(mut self, enabled: bool) -> Self {
        self.enable_auto_update = enabled;
        self
    }

    /// Recomputation period
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Reject out-of-order bounds, negative weights and empty buffers
    pub fn validate(&self) -> Result<()> {
        let result = self.check();
        if let Err(e) = &result {
            warn!("Rejecting concurrency config: {}", e);
        }
        result
    }

    fn check(&self) -> Result<()> {
        if self.min_concurrency == 0 {
            return Err(CoreError::InvalidCapacity("min_concurrency".into()).into());
        }
        CoreError::check_range(
            "concurrency",
            self.min_concurrency as f64,
            self.max_concurrency as f64,
        )?;
        CoreError::check_weight("device_weight", self.device_weight)?;
        CoreError::check_weight("network_weight", self.network_weight)?;
        if self.device_weight + self.network_weight == 0.0 {
            return Err(GovernorError::ZeroWeights("concurrency"));
        }
        CoreError::check_capacity("performance_history_size", self.performance_history_size)?;
        CoreError::check_capacity("adjustment_history_size", self.adjustment_history_size)?;
        if self.update_interval_ms == 0 {
            return Err(CoreError::InvalidInterval(0).into());
        }
        Ok(())
    }
}

/// Batch size governor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Lower bound on batch size
    pub min_batch_size: u32,
    /// Upper bound on batch size
    pub max_batch_size: u32,
    /// Baseline for device types missing from `device_type_defaults`
    pub default_batch_size: u32,
    /// Recomputation period in ms
    pub update_interval_ms: u64,
    /// Weight of the device factor
    pub device_weight: f64,
    /// Weight of the network factor
    pub network_weight: f64,
    /// Weight of the history factor
    pub history_weight: f64,
    /// Weight of the memory factor
    pub memory_weight: f64,
    /// Baseline batch size per device type
    pub device_type_defaults: HashMap<DeviceType, u32>,
    /// Performance samples kept
    pub performance_history_size: usize,
    /// Adjustment records kept
    pub adjustment_history_size: usize,
    /// Width of the batch size buckets used for history analysis
    pub bucket_width: u32,
    /// Recompute on a timer once started
    pub enable_auto_update: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        let device_type_defaults = HashMap::from([
            (DeviceType::Mobile, 15),
            (DeviceType::Tablet, 20),
            (DeviceType::Desktop, 30),
            (DeviceType::LowEnd, 10),
        ]);

        Self {
            min_batch_size: 5,
            max_batch_size: 50,
            default_batch_size: 20,
            update_interval_ms: 10_000,
            device_weight: 0.4,
            network_weight: 0.3,
            history_weight: 0.2,
            memory_weight: 0.1,
            device_type_defaults,
            performance_history_size: 10,
            adjustment_history_size: 20,
            bucket_width: 5,
            enable_auto_update: true,
        }
    }
}

impl BatchConfig {
    /// Parse from JSON, filling gaps with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(CoreError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Set batch size bounds
    pub fn with_bounds(mut self, min: u32, max: u32) -> Self {
        self.min_batch_size = min;
        self.max_batch_size = max;
        self
    }

    /// Set the baseline for one device type
    pub fn with_device_default(mut self, device_type: DeviceType, batch_size: u32) -> Self {
        self.device_type_defaults.insert(device_type, batch_size);
        self
    }

    /// Set recomputation period
    pub fn with_update_interval_ms(mut self, ms: u64) -> Self {
        self.update_interval_ms = ms;
        self
    }

    /// Enable or disable the timer
    pub fn with_auto_update(mut self, enabled: bool) -> Self {
        self.enable_auto_update = enabled;
        self
    }

    /// Recomputation period
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Baseline batch size for a device type
    pub fn base_batch_size(&self, device_type: DeviceType) -> u32 {
        self.device_type_defaults
            .get(&device_type)
            .copied()
            .unwrap_or(self.default_batch_size)
    }

    /// Reject out-of-order bounds, negative weights and empty buffers
    pub fn validate(&self) -> Result<()> {
        let result = self.check();
        if let Err(e) = &result {
            warn!("Rejecting batch config: {}", e);
        }
        result
    }

    fn check(&self) -> Result<()> {
        if self.min_batch_size == 0 {
            return Err(CoreError::InvalidCapacity("min_batch_size".into()).into());
        }
        CoreError::check_range(
            "batch_size",
            self.min_batch_size as f64,
            self.max_batch_size as f64,
        )?;

        let weights = [
            ("device_weight", self.device_weight),
            ("network_weight", self.network_weight),
            ("history_weight", self.history_weight),
            ("memory_weight", self.memory_weight),
        ];
        for (name, value) in weights {
            CoreError::check_weight(name, value)?;
        }
        if weights.iter().map(|(_, w)| w).sum::<f64>() == 0.0 {
            return Err(GovernorError::ZeroWeights("batch size"));
        }

        CoreError::check_capacity("performance_history_size", self.performance_history_size)?;
        CoreError::check_capacity("adjustment_history_size", self.adjustment_history_size)?;
        CoreError::check_capacity("bucket_width", self.bucket_width as usize)?;
        if self.update_interval_ms == 0 {
            return Err(CoreError::InvalidInterval(0).into());
        }
        Ok(())
    }
}
