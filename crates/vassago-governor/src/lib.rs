//! Concurrency and Batch Size Governors
//!
//! Governors periodically recompute a bounded recommendation from weighted,
//! individually clamped factors:
//!
//! - **ConcurrencyGovernor**: parallel request count from the device and
//!   network probe recommendations, battery state and recent success rate
//! - **BatchSizeGovernor**: resources per load wave from a device-type
//!   baseline, scaled by device, network, history and memory factors
//!
//! Callers close the loop by recording a `PerformanceSample` after each load
//! wave; the next recomputation reads it. Every recomputation appends an
//! `AdjustmentRecord` to a bounded audit log.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       vassago-governor                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  DeviceMetricsProbe ──┐                                          │
//! │                       ├──> factors ──> weighted sum ──> clamp   │
//! │  NetworkMetricsProbe ─┤       ↑                           │      │
//! │                       │  PerformanceHistory               ↓      │
//! │  Battery / Memory ────┘  (bucketed by size)    AdjustmentRecord  │
//! │                                                                  │
//! │  TaskHandle::repeating ──> update every update_interval          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use vassago_governor::prelude::*;
//!
//! let governor = Arc::new(BatchSizeGovernor::new(BatchConfig::default(), device, network)?);
//! governor.start_auto_update();
//!
//! let size = governor.current_batch_size();
//! // ... load `size` resources ...
//! governor.record_performance(PerformanceSample::new(size, elapsed_ms, success_rate, size));
//! ```

mod batch;
mod concurrency;
mod config;
mod error;
mod factors;
mod history;

pub use batch::{BatchAdjustment, BatchSizeGovernor};
pub use concurrency::{ConcurrencyAdjustment, ConcurrencyGovernor};
pub use config::{BatchConfig, ConcurrencyConfig};
pub use error::{GovernorError, Result};
pub use factors::{
    battery_batch_factor, battery_concurrency_factor, concurrency_history_factor, device_factor,
    history_factor, memory_factor, network_factor, round_clamped, BatchFactors,
    ConcurrencyFactors, NEUTRAL_MEMORY_RATIO,
};
pub use history::{bucket_of, BucketStats, PerformanceHistory};

/// Prelude for common imports
pub mod prelude {
    pub use super::{
        BatchConfig, BatchSizeGovernor, ConcurrencyConfig, ConcurrencyGovernor, Result,
    };
    pub use vassago_core::PerformanceSample;
}
