//! Batch size governor

use crate::config::BatchConfig;
use crate::factors::{
    battery_batch_factor, device_factor, history_factor, memory_factor, network_factor,
    round_clamped, BatchFactors,
};
use crate::history::PerformanceHistory;
use crate::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use vassago_core::{AdjustmentRecord, PerformanceSample, RingBuffer, TaskHandle};
use vassago_probe::{DeviceMetricsProbe, NetworkMetricsProbe};

/// One batch size recomputation
pub type BatchAdjustment = AdjustmentRecord<BatchFactors>;

struct BatchState {
    current: u32,
    performance: PerformanceHistory,
    adjustments: RingBuffer<BatchAdjustment>,
}

/// Recommends how many resources to group per load wave
///
/// The recommendation starts from a device-type baseline and is scaled by
/// the weighted device, network, history and memory factors, then derated
/// on a low battery.
pub struct BatchSizeGovernor {
    config: BatchConfig,
    device: Arc<DeviceMetricsProbe>,
    network: Arc<NetworkMetricsProbe>,
    state: Mutex<BatchState>,
    timer: Mutex<Option<TaskHandle>>,
}

impl BatchSizeGovernor {
    /// Create a governor and compute the first recommendation
    pub fn new(
        config: BatchConfig,
        device: Arc<DeviceMetricsProbe>,
        network: Arc<NetworkMetricsProbe>,
    ) -> Result<Self> {
        config.validate()?;

        let state = BatchState {
            current: config
                .default_batch_size
                .clamp(config.min_batch_size, config.max_batch_size),
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

        let initial = governor.update_batch_size();
        info!(
            "Batch size governor ready: {} (base {})",
            initial.new_value, initial.factors.base_batch_size
        );
        Ok(governor)
    }

    /// Governor configuration
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Recompute the batch size from current probe snapshots and history
    pub fn update_batch_size(&self) -> BatchAdjustment {
        let device = self.device.snapshot();
        let network = self.network.snapshot();
        let capabilities = self.device.capabilities();
        let memory_ratio = self.device.memory_pressure();
        let config = &self.config;

        let mut state = self.lock_state();

        let base_batch_size = config.base_batch_size(device.device_type);
        let device_f = device_factor(&device);
        let network_f = network_factor(&network, self.network.has_data());
        let history_f = history_factor(&state.performance, state.current, config.bucket_width);
        let memory_f = memory_factor(capabilities.heap_usage, memory_ratio);
        let battery_f = battery_batch_factor(capabilities.battery, device.battery);

        let combined = device_f * config.device_weight
            + network_f * config.network_weight
            + history_f * config.history_weight
            + memory_f * config.memory_weight;

        let adjusted = base_batch_size as f64 * combined * battery_f;
        let batch_size = round_clamped(adjusted, config.min_batch_size, config.max_batch_size);

        let factors = BatchFactors {
            base_batch_size,
            device: device_f,
            network: network_f,
            history: history_f,
            memory: memory_f,
            battery: battery_f,
            combined,
        };
        let record = AdjustmentRecord::new(state.current, batch_size, factors);

        if batch_size != state.current {
            debug!(
                "Batch size {} -> {} (device {:.2}, network {:.2}, history {:.2}, memory {:.2}, battery {:.2})",
                state.current, batch_size, device_f, network_f, history_f, memory_f, battery_f
            );
        }

        state.current = batch_size;
        state.adjustments.push(record.clone());
        record
    }

    /// Last computed batch size
    pub fn current_batch_size(&self) -> u32 {
        self.lock_state().current
    }

    /// Append a load outcome to the history
    pub fn record_performance(&self, sample: PerformanceSample) {
        self.lock_state().performance.record(sample);
    }

    /// Recorded load outcomes, oldest first
    pub fn performance_history(&self) -> Vec<PerformanceSample> {
        self.lock_state().performance.samples()
    }

    /// Recomputations, oldest first
    pub fn adjustment_history(&self) -> Vec<BatchAdjustment> {
        self.lock_state().adjustments.to_vec()
    }

    /// Factors behind the current batch size
    pub fn last_factors(&self) -> Option<BatchFactors> {
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
    ///
    /// Returns `false` when auto update is disabled or no runtime is
    /// available.
    pub fn start_auto_update(self: &Arc<Self>) -> bool {
        if !self.config.enable_auto_update {
            return false;
        }

        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if timer.as_ref().map_or(false, TaskHandle::is_active) {
            return true;
        }

        let governor = Arc::downgrade(self);
        *timer = TaskHandle::repeating("batch-governor", self.config.update_interval(), move || {
            match governor.upgrade() {
                Some(governor) => {
                    governor.update_batch_size();
                    true
                }
                None => false,
            }
        });
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

    fn lock_state(&self) -> MutexGuard<'_, BatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
