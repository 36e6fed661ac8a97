//! Factor functions
//!
//! Each factor is a dimensionless multiplier clamped to its own range before
//! it is combined. Functions that read an optional platform API take the
//! matching capability flag and return the neutral value when it is absent.

use crate::history::{bucket_of, PerformanceHistory};
use serde::{Deserialize, Serialize};
use vassago_core::{
    BatteryStatus, DeviceSnapshot, EffectiveType, NetworkSnapshot, CRITICAL_BATTERY_LEVEL,
    LOW_BATTERY_LEVEL,
};

/// Memory usage ratio assumed when the platform does not report one
pub const NEUTRAL_MEMORY_RATIO: f64 = 0.5;

/// Factor breakdown of one batch size recomputation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFactors {
    /// Device-type baseline
    pub base_batch_size: u32,
    /// Device factor, [0.5, 1.5]
    pub device: f64,
    /// Network factor, [0.5, 1.5]
    pub network: f64,
    /// History factor, [0.7, 1.3]
    pub history: f64,
    /// Memory factor, [0.6, 1.0]
    pub memory: f64,
    /// Battery derating, 0.6, 0.8 or 1.0
    pub battery: f64,
    /// Weighted sum of the four clamped factors
    pub combined: f64,
}

/// Factor breakdown of one concurrency recomputation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencyFactors {
    /// Device probe recommendation
    pub device_concurrency: u32,
    /// Network probe recommendation
    pub network_concurrency: u32,
    /// Weighted sum before derating
    pub weighted: f64,
    /// Battery derating, [0.7, 0.9] or 1.0
    pub battery: f64,
    /// History adjustment, 0.9, 1.0 or 1.1
    pub history: f64,
}

/// Device factor from hardware score and core count
pub fn device_factor(snapshot: &DeviceSnapshot) -> f64 {
    let hardware = (snapshot.hardware_score / 70.0).clamp(0.7, 1.5);
    let cores = (snapshot.cpu_cores as f64 / 4.0).clamp(0.8, 1.3);
    finite_or(0.7 * hardware + 0.3 * cores, 1.0).clamp(0.5, 1.5)
}

/// Network factor from effective type and downlink
pub fn network_factor(snapshot: &NetworkSnapshot, available: bool) -> f64 {
    if !available {
        return 1.0;
    }

    let base = match snapshot.effective_type {
        EffectiveType::FourG => 1.2,
        EffectiveType::ThreeG => 1.0,
        EffectiveType::TwoG => 0.7,
        EffectiveType::Slow2G => 0.5,
        EffectiveType::Unknown => 1.0,
    };

    let factor = if snapshot.downlink_mbps > 0.0 {
        base * (snapshot.downlink_mbps / 2.0).clamp(0.7, 1.3)
    } else {
        base
    };
    finite_or(factor, 1.0).clamp(0.5, 1.5)
}

/// History factor from the best scoring batch size bucket
///
/// Pulls toward the best bucket by one percent per unit of distance between
/// bucket edges. Neutral with fewer than two samples.
pub fn history_factor(history: &PerformanceHistory, current_batch_size: u32, bucket_width: u32) -> f64 {
    if history.len() < 2 {
        return 1.0;
    }
    let Some(best) = history.best_bucket(bucket_width) else {
        return 1.0;
    };

    let best_group = best.group as f64;
    let current_group = bucket_of(current_batch_size, bucket_width) as f64;

    if best_group > current_group {
        (1.0 + (best_group - current_group) / 100.0).min(1.3)
    } else if best_group < current_group {
        (1.0 - (current_group - best_group) / 100.0).max(0.7)
    } else {
        1.0
    }
}

/// Memory factor from the used/limit ratio
pub fn memory_factor(available: bool, usage_ratio: Option<f64>) -> f64 {
    let ratio = if available {
        usage_ratio
            .filter(|r| r.is_finite())
            .unwrap_or(NEUTRAL_MEMORY_RATIO)
    } else {
        NEUTRAL_MEMORY_RATIO
    };

    if ratio < 0.6 {
        1.0
    } else if ratio < 0.7 {
        0.9
    } else if ratio < 0.8 {
        0.8
    } else {
        0.6
    }
}

/// Batch size derating on a discharging battery
pub fn battery_batch_factor(available: bool, battery: Option<BatteryStatus>) -> f64 {
    match battery {
        Some(b) if available && b.is_discharging_below(CRITICAL_BATTERY_LEVEL) => 0.6,
        Some(b) if available && b.is_discharging_below(LOW_BATTERY_LEVEL) => 0.8,
        _ => 1.0,
    }
}

/// Concurrency derating on a discharging battery
///
/// Scales from 0.9 at 20% charge down to 0.7 at empty.
pub fn battery_concurrency_factor(available: bool, battery: Option<BatteryStatus>) -> f64 {
    match battery {
        Some(b) if available && b.is_discharging_below(LOW_BATTERY_LEVEL) => {
            (0.9 - (LOW_BATTERY_LEVEL - b.level)).clamp(0.7, 0.9)
        }
        _ => 1.0,
    }
}

/// Concurrency adjustment from recent success rate and load time
pub fn concurrency_history_factor(history: &PerformanceHistory) -> f64 {
    let (Some(success), Some(load_time)) =
        (history.average_success_rate(), history.average_load_time())
    else {
        return 1.0;
    };

    if success < 0.85 {
        0.9
    } else if success > 0.98 && load_time < 1000.0 {
        1.1
    } else {
        1.0
    }
}

/// Round and clamp a governor output into `[min, max]`
pub fn round_clamped(value: f64, min: u32, max: u32) -> u32 {
    if !value.is_finite() {
        return min;
    }
    value.round().clamp(min as f64, max as f64) as u32
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
