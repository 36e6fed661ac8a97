//! Platform sensing seam and the capability value object
//!
//! Every platform API the controller reads is optional. A `PlatformSensors`
//! implementation returns `None` for anything the host cannot provide, and
//! `Capabilities::detect` records once which readings exist so factor
//! functions can choose between a measured value and a neutral default.

use crate::{BatteryStatus, DeviceType, EffectiveType};
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};
use tokio::sync::watch;

/// Connection information mirrored from the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Connection type (wifi, cellular, ethernet, ...)
    pub connection_type: String,
    /// Downlink estimate in Mbps
    pub downlink_mbps: Option<f64>,
    /// Round-trip time in ms
    pub rtt_ms: Option<f64>,
    /// Platform effective type
    pub effective_type: Option<EffectiveType>,
}

impl ConnectionInfo {
    /// Create connection info with only a type
    pub fn new(connection_type: impl Into<String>) -> Self {
        Self {
            connection_type: connection_type.into(),
            downlink_mbps: None,
            rtt_ms: None,
            effective_type: None,
        }
    }

    /// Set downlink
    pub fn with_downlink(mut self, mbps: f64) -> Self {
        self.downlink_mbps = Some(mbps);
        self
    }

    /// Set round-trip time
    pub fn with_rtt(mut self, rtt_ms: f64) -> Self {
        self.rtt_ms = Some(rtt_ms);
        self
    }

    /// Set effective type
    pub fn with_effective_type(mut self, effective_type: EffectiveType) -> Self {
        self.effective_type = Some(effective_type);
        self
    }
}

/// Heap or memory usage reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeapUsage {
    /// Bytes in use
    pub used_bytes: u64,
    /// Bytes available to the process
    pub limit_bytes: u64,
}

impl HeapUsage {
    /// Usage ratio (0.0 - 1.0), `None` when the limit is unknown
    pub fn ratio(&self) -> Option<f64> {
        if self.limit_bytes == 0 {
            return None;
        }
        Some((self.used_bytes as f64 / self.limit_bytes as f64).clamp(0.0, 1.0))
    }
}

/// Source of platform capability readings
pub trait PlatformSensors: Send + Sync {
    /// Logical CPU cores
    fn hardware_concurrency(&self) -> Option<u32>;

    /// Device memory in GB
    fn device_memory_gb(&self) -> Option<f64>;

    /// Form factor, if the platform reports one
    fn form_factor(&self) -> Option<DeviceType> {
        None
    }

    /// Battery state
    fn battery(&self) -> Option<BatteryStatus>;

    /// Connection information
    fn connection(&self) -> Option<ConnectionInfo>;

    /// Heap usage
    fn heap_usage(&self) -> Option<HeapUsage>;

    /// Battery change notifications
    fn battery_events(&self) -> Option<watch::Receiver<Option<BatteryStatus>>> {
        None
    }

    /// Connection change notifications
    fn connection_events(&self) -> Option<watch::Receiver<ConnectionInfo>> {
        None
    }
}

/// Which optional platform APIs are present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Core count is reported
    pub hardware_concurrency: bool,
    /// Device memory is reported
    pub device_memory: bool,
    /// Battery state is reported
    pub battery: bool,
    /// Connection info is reported
    pub connection: bool,
    /// Heap usage is reported
    pub heap_usage: bool,
}

impl Capabilities {
    /// Probe each API once
    pub fn detect(sensors: &dyn PlatformSensors) -> Self {
        Self {
            hardware_concurrency: sensors.hardware_concurrency().is_some(),
            device_memory: sensors.device_memory_gb().is_some(),
            battery: sensors.battery().is_some() || sensors.battery_events().is_some(),
            connection: sensors.connection().is_some(),
            heap_usage: sensors.heap_usage().is_some(),
        }
    }

    /// No optional API available
    pub fn none() -> Self {
        Self::default()
    }

    /// Every optional API available
    pub fn all() -> Self {
        Self {
            hardware_concurrency: true,
            device_memory: true,
            battery: true,
            connection: true,
            heap_usage: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SensorValues {
    cores: Option<u32>,
    memory_gb: Option<f64>,
    form_factor: Option<DeviceType>,
    battery: Option<BatteryStatus>,
    connection: Option<ConnectionInfo>,
    heap: Option<HeapUsage>,
}

/// Sensors fed by the host
///
/// Values can change after construction; `set_battery` and `set_connection`
/// also publish a change notification to subscribed probes.
#[derive(Debug)]
pub struct ManualSensors {
    values: RwLock<SensorValues>,
    battery_tx: watch::Sender<Option<BatteryStatus>>,
    connection_tx: watch::Sender<ConnectionInfo>,
}

impl ManualSensors {
    /// Create sensors with nothing available
    pub fn new() -> Self {
        let (battery_tx, _) = watch::channel(None);
        let (connection_tx, _) = watch::channel(ConnectionInfo::new("unknown"));
        Self {
            values: RwLock::new(SensorValues::default()),
            battery_tx,
            connection_tx,
        }
    }

    /// Set core count
    pub fn with_cores(self, cores: u32) -> Self {
        self.write(|v| v.cores = Some(cores.max(1)));
        self
    }

    /// Set device memory
    pub fn with_memory_gb(self, gb: f64) -> Self {
        self.write(|v| v.memory_gb = Some(gb));
        self
    }

    /// Set form factor
    pub fn with_form_factor(self, device_type: DeviceType) -> Self {
        self.write(|v| v.form_factor = Some(device_type));
        self
    }

    /// Set initial battery state
    pub fn with_battery(self, battery: BatteryStatus) -> Self {
        self.set_battery(Some(battery));
        self
    }

    /// Set initial connection
    pub fn with_connection(self, connection: ConnectionInfo) -> Self {
        self.set_connection(connection);
        self
    }

    /// Set heap usage
    pub fn with_heap(self, heap: HeapUsage) -> Self {
        self.set_heap(Some(heap));
        self
    }

    /// Update battery state and notify listeners
    pub fn set_battery(&self, battery: Option<BatteryStatus>) {
        self.write(|v| v.battery = battery);
        self.battery_tx.send_replace(battery);
    }

    /// Update connection and notify listeners
    pub fn set_connection(&self, connection: ConnectionInfo) {
        self.write(|v| v.connection = Some(connection.clone()));
        self.connection_tx.send_replace(connection);
    }

    /// Update heap usage
    pub fn set_heap(&self, heap: Option<HeapUsage>) {
        self.write(|v| v.heap = heap);
    }

    fn write(&self, f: impl FnOnce(&mut SensorValues)) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut values);
    }

    fn read(&self) -> SensorValues {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for ManualSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformSensors for ManualSensors {
    fn hardware_concurrency(&self) -> Option<u32> {
        self.read().cores
    }

    fn device_memory_gb(&self) -> Option<f64> {
        self.read().memory_gb
    }

    fn form_factor(&self) -> Option<DeviceType> {
        self.read().form_factor
    }

    fn battery(&self) -> Option<BatteryStatus> {
        self.read().battery
    }

    fn connection(&self) -> Option<ConnectionInfo> {
        self.read().connection
    }

    fn heap_usage(&self) -> Option<HeapUsage> {
        self.read().heap
    }

    fn battery_events(&self) -> Option<watch::Receiver<Option<BatteryStatus>>> {
        Some(self.battery_tx.subscribe())
    }

    fn connection_events(&self) -> Option<watch::Receiver<ConnectionInfo>> {
        Some(self.connection_tx.subscribe())
    }
}
