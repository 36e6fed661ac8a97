//! Concurrency governor

use crate::config::ConcurrencyConfig;
use crate::factors::{
    battery_concurrency_factor, concurrency_history_factor, round_clamped, ConcurrencyFactors,
};
use crate::history::PerformanceHistory;
use crate::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use vassago_core::{AdjustmentRecord, PerformanceSample, RingBuffer, TaskHandle};
use vassago_probe::{DeviceMetricsProbe, NetworkMetricsProbe};

/// One concurrency recomputation
pub type ConcurrencyAdjustment = AdjustmentRecord<ConcurrencyFactors>;

/// Concurrency used before the first recomputation
const INITIAL_CONCURRENCY: u32 = 4;

struct ConcurrencyState {
    current: u32,
    performance: PerformanceHistory,
    adjustments: RingBuffer<ConcurrencyAdjustment>,
}

/// Recommends how many requests to keep in flight
pub struct ConcurrencyGovernor {
    config: ConcurrencyConfig,
    device: Arc<DeviceMetricsProbe>,
    network: Arc<NetworkMetricsProbe>,
    state: Mutex<ConcurrencyState>,
    timer: Mutex<Option<TaskHandle>>,
}

impl ConcurrencyGovernor {
    /// Create a governor and compute the first recommendation
    pub fn new(
        config: ConcurrencyConfig,
        device: Arc<DeviceMetricsProbe>,
        network: Arc<NetworkMetricsProbe>,
    ) -> Result<Self> {
        config.validate()?;

        let state = ConcurrencyState {
            current: INITIAL_CONCURRENCY.clamp(config.min_concurrency, config.max_concurrency),
            performance: PerformanceHistory::new(config.performance_history_size),
            adjustments: RingBuffer::new(config.adjustment_history_size),
        };

        let governor = Self {
            config,
            device,
            network,
            state: Mutex::new(state),
            timer: Mutex::new(None),
        };

        let initial = governor.update_concurrency_settings();
        info!("Concurrency governor ready: {}", initial.new_value);
        Ok(governor)
    }

    /// Governor configuration
    pub fn config(&self) -> &ConcurrencyConfig {
        &self.config
    }

    /// Recompute concurrency from current probe snapshots and history
    pub fn update_concurrency_settings(&self) -> ConcurrencyAdjustment {
        let device_concurrency = self.device.recommended_concurrency();
        let network_concurrency = self.network.recommended_concurrency();
        let battery = self.device.snapshot().battery;
        let capabilities = self.device.capabilities();
        let config = &self.config;

        let mut state = self.lock_state();

        let weighted = device_concurrency as f64 * config.device_weight
            + network_concurrency as f64 * config.network_weight;
        let battery_f = battery_concurrency_factor(capabilities.battery, battery);
        let history_f = concurrency_history_factor(&state.performance);

        let concurrency = round_clamped(
            weighted * battery_f * history_f,
            config.min_concurrency,
            config.max_concurrency,
        );

        let factors = ConcurrencyFactors {
            device_concurrency,
            network_concurrency,
            weighted,
            battery: battery_f,
            history: history_f,
        };
        let record = AdjustmentRecord::new(state.current, concurrency, factors);

        if concurrency != state.current {
            debug!(
                "Concurrency {} -> {} (device {}, network {}, battery {:.2}, history {:.2})",
                state.current,
                concurrency,
                device_concurrency,
                network_concurrency,
                battery_f,
                history_f
            );
        }

        state.current = concurrency;
        state.adjustments.push(record.clone());
        record
    }

    /// Last computed concurrency
    pub fn recommended_concurrency(&self) -> u32 {
        self.lock_state().current
    }

    /// Append a load outcome to the history
    pub fn record_performance_result(&self, sample: PerformanceSample) {
        self.lock_state().performance.record(sample);
    }

    /// Recorded load outcomes, oldest first
    pub fn performance_history(&self) -> Vec<PerformanceSample> {
        self.lock_state().performance.samples()
    }

    /// Recomputations, oldest first
    pub fn adjustment_history(&self) -> Vec<ConcurrencyAdjustment> {
        self.lock_state().adjustments.to_vec()
    }

    /// Factors behind the current concurrency
    pub fn last_factors(&self) -> Option<ConcurrencyFactors> {
        self.lock_state()
            .adjustments
            .latest()
            .map(|record| record.factors.clone())
    }

    /// Forget recorded load outcomes
    pub fn reset_history(&self) {
        self.lock_state().performance.clear();
    }

    /// Recompute every `update_interval` until `cleanup`
    pub fn start_auto_update(self: &Arc<Self>) -> bool {
        if !self.config.enable_auto_update {
            return false;
        }

        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if timer.as_ref().map_or(false, TaskHandle::is_active) {
            return true;
        }

        let governor = Arc::downgrade(self);
        *timer = TaskHandle::repeating(
            "concurrency-governor",
            self.config.update_interval(),
            move || match governor.upgrade() {
                Some(governor) => {
                    governor.update_concurrency_settings();
                    true
                }
                None => false,
            },
        );
        timer.is_some()
    }

    /// Check if the timer is running
    pub fn is_auto_updating(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(false, TaskHandle::is_active)
    }

    /// Stop the timer; getters keep returning the last values
    pub fn cleanup(&self) {
        let task = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut task) = task {
            task.cancel();
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ConcurrencyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
