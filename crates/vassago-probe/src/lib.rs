//! Device and Network Probes
//!
//! Probes sample an external capability into a snapshot that governors read
//! but never mutate:
//!
//! - **DeviceMetricsProbe**: CPU cores, device memory, a one-shot
//!   microbenchmark and battery state, folded into a 0-100 hardware score
//! - **NetworkMetricsProbe**: platform connection info (passive) and
//!   sequential bandwidth probes (active), folded into an effective type
//!
//! Missing platform APIs never fail a probe. Each reading falls back to a
//! documented neutral default, and a failed bandwidth sweep leaves the last
//! good snapshot in place.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         vassago-probe                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  PlatformSensors ──┬──> DeviceMetricsProbe ──> DeviceSnapshot   │
//! │  (System/Manual)   │          ↑                                  │
//! │                    │    Microbenchmark (once)                    │
//! │                    │                                             │
//! │                    └──> NetworkMetricsProbe ──> NetworkSnapshot │
//! │                               ↑                                  │
//! │                         ProbeTransport                           │
//! │                    (1 / 10 / 50 / 100 KB sweep)                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod bandwidth;
mod benchmark;
mod device;
mod error;
mod network;
mod system;

pub use bandwidth::{trimmed_mean, HttpProbeTransport, ProbeTransport};
pub use benchmark::{benchmark_score, ArithmeticBenchmark, Microbenchmark, StaticBenchmark};
pub use device::{
    blended_hardware_score, cpu_score, device_concurrency, fallback_hardware_score, memory_score,
    DeviceMetricsProbe,
};
pub use error::{ProbeError, Result};
pub use network::{
    network_concurrency, BandwidthMeasurement, BandwidthReport, NetworkMetricsProbe,
    NetworkProbeConfig,
};
pub use system::SystemSensors;

/// Minimum concurrency a device probe recommends
pub const MIN_DEVICE_CONCURRENCY: u32 = 2;

/// Maximum concurrency a device probe recommends
pub const MAX_DEVICE_CONCURRENCY: u32 = 16;

/// Prelude for common imports
pub mod prelude {
    pub use super::{
        DeviceMetricsProbe, Microbenchmark, NetworkMetricsProbe, NetworkProbeConfig,
        ProbeTransport, Result, SystemSensors,
    };
}
