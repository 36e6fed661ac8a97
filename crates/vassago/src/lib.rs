//! # Vassago
//!
//! Adaptive resource loading controller. Vassago senses device capability,
//! network quality, battery state and past load outcomes, and recommends how
//! many resources to fetch in parallel, how many to group per load wave, and
//! which to fetch first.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use vassago::prelude::*;
//!
//! let controller = LoadController::new(ControllerConfig::default(), Arc::new(SystemSensors::new()))?;
//! controller.start();
//! controller.calibrate().await;
//!
//! let batch = controller.current_batch_size();
//! let parallel = controller.recommended_concurrency();
//! // ... issue `batch` loads, `parallel` at a time ...
//! controller.record_performance(PerformanceSample::new(batch, elapsed_ms, success_rate, batch));
//!
//! controller.cleanup();
//! ```
//!
//! ## Components
//!
//! | Component | Crate | Output |
//! |-----------|-------|--------|
//! | DeviceMetricsProbe | `vassago-probe` | `DeviceSnapshot`, hardware score 0-100 |
//! | NetworkMetricsProbe | `vassago-probe` | `NetworkSnapshot`, effective type |
//! | ConcurrencyGovernor | `vassago-governor` | parallel requests, 2-16 |
//! | BatchSizeGovernor | `vassago-governor` | resources per wave, 5-50 |
//! | ResourcePriorityScorer | `vassago-priority` | priority 0.0-1.0 |
//!
//! ## Control Loop
//!
//! ```text
//!   PlatformSensors ──> probes ──> governors ──> recommendation
//!                                     ↑                │
//!                                     │                ↓
//!                           PerformanceSample <── caller loads
//! ```

mod config;
mod controller;
mod error;
mod report;

pub use config::ControllerConfig;
pub use controller::LoadController;
pub use error::{Result, VassagoError};
pub use report::{overall_score, PerformanceReport};

pub use vassago_core::{
    AdjustmentRecord, BatteryStatus, Capabilities, ConnectionInfo, DeviceSnapshot, DeviceType,
    EffectiveType, HeapUsage, ManualSensors, NetworkSnapshot, PerformanceSample,
    PlatformSensors, RingBuffer,
};
pub use vassago_governor::{
    BatchConfig, BatchFactors, BatchSizeGovernor, ConcurrencyConfig, ConcurrencyFactors,
    ConcurrencyGovernor,
};
pub use vassago_priority::{
    NavigationTable, PriorityScore, ResourcePerformance, ResourcePriorityScorer, ResourceRef,
    ResourceType, ScorerConfig, ScoringContext,
};
pub use vassago_probe::{
    ArithmeticBenchmark, BandwidthReport, DeviceMetricsProbe, HttpProbeTransport,
    Microbenchmark, NetworkMetricsProbe, NetworkProbeConfig, ProbeError, ProbeTransport,
    StaticBenchmark, SystemSensors,
};

/// Prelude for common imports
pub mod prelude {
    pub use super::{
        ControllerConfig, LoadController, ManualSensors, PerformanceSample, ResourceRef,
        ResourceType, Result, ScoringContext, SystemSensors,
    };
}
