//! Shared Data Model for Adaptive Resource Loading
//!
//! This crate holds the types every other vassago crate speaks:
//!
//! - **Snapshots**: `DeviceSnapshot` and `NetworkSnapshot`, produced by probes
//! - **Feedback**: `PerformanceSample` pushed by callers after each load wave
//! - **Audit**: `AdjustmentRecord` appended by governors on every recomputation
//! - **Bounded history**: `RingBuffer`, evicting the oldest entry on overflow
//! - **Platform sensing**: the `PlatformSensors` seam and the `Capabilities`
//!   value object computed once from it
//! - **Scheduling**: `TaskHandle`, a cancellable repeating task
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        vassago-core                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  PlatformSensors ──> Capabilities (detected once)               │
//! │        │                                                         │
//! │        ↓                                                         │
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐      │
//! │  │   Device     │    │   Network    │    │ Performance  │      │
//! │  │   Snapshot   │    │   Snapshot   │    │   Sample     │      │
//! │  └──────────────┘    └──────────────┘    └──────────────┘      │
//! │         └───────────────────┼───────────────────┘               │
//! │                             ↓                                    │
//! │                   RingBuffer<AdjustmentRecord>                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod error;
mod ring;
mod sensors;
mod task;
mod types;

pub use error::{CoreError, Result};
pub use ring::RingBuffer;
pub use sensors::{Capabilities, ConnectionInfo, HeapUsage, ManualSensors, PlatformSensors};
pub use task::TaskHandle;
pub use types::{
    now_ms, AdjustmentRecord, BatteryStatus, DeviceSnapshot, DeviceType, EffectiveType,
    NetworkSnapshot, PerformanceSample,
};

/// Battery level below which loading is derated when discharging
pub const LOW_BATTERY_LEVEL: f64 = 0.2;

/// Battery level below which loading is derated hardest
pub const CRITICAL_BATTERY_LEVEL: f64 = 0.1;

/// Prelude for common imports
pub mod prelude {
    pub use super::{
        BatteryStatus, Capabilities, DeviceSnapshot, DeviceType, EffectiveType, NetworkSnapshot,
        PerformanceSample, PlatformSensors, Result, RingBuffer,
    };
}
