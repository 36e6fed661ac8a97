//! Native platform sensors

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use sysinfo::System;
use tracing::debug;
use vassago_core::{BatteryStatus, ConnectionInfo, HeapUsage, PlatformSensors};

const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Sensors backed by the host operating system
///
/// Connection info has no native source and always reads `None`.
#[derive(Debug)]
pub struct SystemSensors {
    system: Mutex<System>,
    power_supply: PathBuf,
}

impl SystemSensors {
    /// Create sensors reading the local machine
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
            power_supply: PathBuf::from(POWER_SUPPLY_ROOT),
        }
    }

    /// Read batteries from a different power supply directory
    pub fn with_power_supply_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.power_supply = path.into();
        self
    }
}

impl Default for SystemSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformSensors for SystemSensors {
    fn hardware_concurrency(&self) -> Option<u32> {
        std::thread::available_parallelism()
            .ok()
            .map(|n| n.get() as u32)
    }

    fn device_memory_gb(&self) -> Option<f64> {
        let system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        match system.total_memory() {
            0 => None,
            total => Some(total as f64 / BYTES_PER_GB),
        }
    }

    fn battery(&self) -> Option<BatteryStatus> {
        read_battery(&self.power_supply)
    }

    fn connection(&self) -> Option<ConnectionInfo> {
        None
    }

    fn heap_usage(&self) -> Option<HeapUsage> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_memory();

        let limit_bytes = system.total_memory();
        if limit_bytes == 0 {
            return None;
        }
        Some(HeapUsage {
            used_bytes: system.used_memory(),
            limit_bytes,
        })
    }
}

/// First `BAT*` entry under a power supply directory
fn read_battery(root: &Path) -> Option<BatteryStatus> {
    let Ok(entries) = fs::read_dir(root) else {
        return None;
    };

    for entry in entries.flatten() {
        let dir = entry.path();
        let is_battery = dir
            .file_name()
            .and_then(|s| s.to_str())
            .map_or(false, |name| name.starts_with("BAT"));
        if !is_battery {
            continue;
        }

        let Some(capacity) = read_trimmed(&dir.join("capacity")).and_then(|s| s.parse::<f64>().ok())
        else {
            continue;
        };
        let status = read_trimmed(&dir.join("status")).unwrap_or_default();
        let charging = matches!(status.as_str(), "Charging" | "Full");

        debug!("Battery {}: {}% ({})", dir.display(), capacity, status);
        return Some(BatteryStatus::new(capacity / 100.0, charging));
    }

    None
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}
