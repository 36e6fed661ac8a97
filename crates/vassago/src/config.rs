//! Controller configuration

use crate::Result;
use serde::{Deserialize, Serialize};
use vassago_core::CoreError;
use vassago_governor::{BatchConfig, ConcurrencyConfig};
use vassago_priority::ScorerConfig;
use vassago_probe::{ArithmeticBenchmark, NetworkProbeConfig};

/// Configuration for every component of a `LoadController`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Concurrency governor
    pub concurrency: ConcurrencyConfig,
    /// Batch size governor
    pub batch: BatchConfig,
    /// Network probe
    pub network: NetworkProbeConfig,
    /// Priority scorer
    pub scorer: ScorerConfig,
    /// Iterations of the calibration benchmark
    pub benchmark_iterations: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            concurrency: ConcurrencyConfig::default(),
            batch: BatchConfig::default(),
            network: NetworkProbeConfig::default(),
            scorer: ScorerConfig::default(),
            benchmark_iterations: ArithmeticBenchmark::DEFAULT_ITERATIONS,
        }
    }
}

impl ControllerConfig {
    /// Parse from JSON, filling gaps with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(CoreError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self).map_err(CoreError::from)?)
    }

    /// Enable or disable both governor timers
    pub fn with_auto_update(mut self, enabled: bool) -> Self {
        self.concurrency.enable_auto_update = enabled;
        self.batch.enable_auto_update = enabled;
        self
    }

    /// Set both governor periods
    pub fn with_update_interval_ms(mut self, ms: u64) -> Self {
        self.concurrency.update_interval_ms = ms;
        self.batch.update_interval_ms = ms;
        self
    }

    /// Set the bandwidth probe endpoint
    pub fn with_probe_url(mut self, url: impl Into<String>) -> Self {
        self.network.probe_url = Some(url.into());
        self
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.concurrency.validate()?;
        self.batch.validate()?;
        self.network.validate()?;
        self.scorer.validate()?;
        if self.benchmark_iterations == 0 {
            return Err(CoreError::InvalidCapacity("benchmark_iterations".into()).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VassagoError;

    #[test]
    fn test_default_is_valid() {
        assert!(ControllerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_json_sections() {
        let config = ControllerConfig::from_json(
            r#"{
                "batch": { "min_batch_size": 8, "max_batch_size": 24 },
                "network": { "probe_url": "https://cdn.example.com/probe" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.batch.min_batch_size, 8);
        assert_eq!(config.batch.default_batch_size, 20);
        assert_eq!(config.concurrency.max_concurrency, 16);
        assert_eq!(
            config.network.probe_url.as_deref(),
            Some("https://cdn.example.com/probe")
        );
    }

    #[test]
    fn test_json_rejects_inverted_bounds() {
        let err = ControllerConfig::from_json(r#"{"concurrency": {"min_concurrency": 20}}"#)
            .unwrap_err();
        assert!(matches!(err, VassagoError::Governor(_)));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = ControllerConfig::default().with_update_interval_ms(2_500);
        let parsed = ControllerConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
