//! Device capability probe

use crate::benchmark::{benchmark_score, Microbenchmark};
use crate::{MAX_DEVICE_CONCURRENCY, MIN_DEVICE_CONCURRENCY};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};
use vassago_core::{
    BatteryStatus, Capabilities, DeviceSnapshot, DeviceType, PlatformSensors, TaskHandle,
    LOW_BATTERY_LEVEL,
};

/// Samples device capability into a `DeviceSnapshot`
///
/// Readings are taken once at construction. The hardware score can be
/// refined once with `calibrate`. Battery state follows platform events
/// after `listen`, or is re-read on `refresh`.
pub struct DeviceMetricsProbe {
    sensors: Option<Arc<dyn PlatformSensors>>,
    capabilities: Capabilities,
    snapshot: RwLock<DeviceSnapshot>,
    listeners: Mutex<Vec<TaskHandle>>,
}

impl DeviceMetricsProbe {
    /// Core count assumed when the platform does not report one
    pub const DEFAULT_CORES: u32 = 4;

    /// Memory score used when device memory is not reported
    pub const DEFAULT_MEMORY_SCORE: f64 = 70.0;

    /// Sample the given sensors
    pub fn new(sensors: Arc<dyn PlatformSensors>) -> Self {
        let capabilities = Capabilities::detect(sensors.as_ref());
        let snapshot = Self::sample(sensors.as_ref());

        info!(
            "Device probe: {} cores, type {}, hardware score {:.1}",
            snapshot.cpu_cores, snapshot.device_type, snapshot.hardware_score
        );

        Self {
            sensors: Some(sensors),
            capabilities,
            snapshot: RwLock::new(snapshot),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Create a probe around a fixed snapshot
    pub fn from_snapshot(snapshot: DeviceSnapshot) -> Self {
        let capabilities = Capabilities {
            hardware_concurrency: true,
            device_memory: true,
            battery: true,
            ..Capabilities::none()
        };

        Self {
            sensors: None,
            capabilities,
            snapshot: RwLock::new(snapshot),
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn sample(sensors: &dyn PlatformSensors) -> DeviceSnapshot {
        let cores = sensors
            .hardware_concurrency()
            .unwrap_or(Self::DEFAULT_CORES)
            .max(1);
        let memory_gb = sensors.device_memory_gb().filter(|gb| gb.is_finite());

        let cpu = cpu_score(cores);
        let memory = memory_gb.map_or(Self::DEFAULT_MEMORY_SCORE, memory_score);
        let device_type = sensors
            .form_factor()
            .unwrap_or_else(|| DeviceType::classify(cores, memory_gb));

        DeviceSnapshot {
            cpu_score: cpu,
            memory_score: memory,
            hardware_score: fallback_hardware_score(cpu, memory),
            device_type,
            cpu_cores: cores,
            battery: sensors.battery(),
            calibrated: false,
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> DeviceSnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Optional APIs detected at construction
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Refine the hardware score with a microbenchmark
    ///
    /// A failed benchmark leaves the uncalibrated composite in place. Returns
    /// the resulting hardware score.
    pub fn calibrate(&self, benchmark: &dyn Microbenchmark) -> f64 {
        // Readers keep the previous snapshot while the benchmark runs
        let outcome = benchmark.run();

        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Ok(elapsed) => {
                let bench = benchmark_score(elapsed);
                snapshot.hardware_score =
                    blended_hardware_score(bench, snapshot.cpu_score, snapshot.memory_score);
                snapshot.calibrated = true;
                info!(
                    "Benchmark took {:?} (score {:.1}), hardware score {:.1}",
                    elapsed, bench, snapshot.hardware_score
                );
            }
            Err(e) => {
                warn!("Benchmark failed, using composite hardware score: {}", e);
                snapshot.hardware_score =
                    fallback_hardware_score(snapshot.cpu_score, snapshot.memory_score);
                snapshot.calibrated = false;
            }
        }

        snapshot.hardware_score
    }

    /// Re-read battery state from the sensors
    ///
    /// Covers platforms without battery events. No-op for probes built from a
    /// fixed snapshot.
    pub fn refresh(&self) {
        if let Some(sensors) = &self.sensors {
            if self.capabilities.battery {
                self.apply_battery(sensors.battery());
            }
        }
    }

    /// Replace the battery state
    pub fn apply_battery(&self, battery: Option<BatteryStatus>) {
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        if snapshot.battery != battery {
            debug!("Battery changed: {:?} -> {:?}", snapshot.battery, battery);
            snapshot.battery = battery;
        }
    }

    /// Concurrency this device can sustain on its own
    pub fn recommended_concurrency(&self) -> u32 {
        device_concurrency(&self.snapshot())
    }

    /// Fraction of memory in use, if the platform reports it
    pub fn memory_pressure(&self) -> Option<f64> {
        if !self.capabilities.heap_usage {
            return None;
        }
        self.sensors.as_ref()?.heap_usage()?.ratio()
    }

    /// Follow battery change events
    ///
    /// Returns `false` when the platform has no battery events or no runtime
    /// is available.
    pub fn listen(self: &Arc<Self>) -> bool {
        let Some(rx) = self.sensors.as_ref().and_then(|s| s.battery_events()) else {
            return false;
        };

        let probe = Arc::downgrade(self);
        let task = TaskHandle::watch("battery-listener", rx, move |battery| {
            match probe.upgrade() {
                Some(probe) => {
                    probe.apply_battery(battery);
                    true
                }
                None => false,
            }
        });

        match task {
            Some(task) => {
                self.listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(task);
                true
            }
            None => false,
        }
    }

    /// Detach event listeners
    pub fn cleanup(&self) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for task in listeners.iter_mut() {
            task.cancel();
        }
        listeners.clear();
    }
}

impl Drop for DeviceMetricsProbe {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// CPU score from core count
pub fn cpu_score(cores: u32) -> f64 {
    (cores as f64 / 8.0 * 100.0).min(100.0)
}

/// Memory score from device memory
pub fn memory_score(memory_gb: f64) -> f64 {
    (memory_gb / 8.0 * 100.0).clamp(0.0, 100.0)
}

/// Hardware score without a benchmark
pub fn fallback_hardware_score(cpu: f64, memory: f64) -> f64 {
    (0.5 * cpu + 0.5 * memory).clamp(0.0, 100.0)
}

/// Hardware score weighted toward the benchmark
pub fn blended_hardware_score(benchmark: f64, cpu: f64, memory: f64) -> f64 {
    (0.7 * benchmark + 0.15 * cpu + 0.15 * memory).clamp(0.0, 100.0)
}

/// Device-only concurrency recommendation
pub fn device_concurrency(snapshot: &DeviceSnapshot) -> u32 {
    let base = match snapshot.device_type {
        DeviceType::Mobile => 4.0,
        _ => 10.0,
    };

    let scaled = (base * snapshot.hardware_score / 100.0).ceil();
    let mut concurrency = (snapshot.cpu_cores as f64).min(scaled);

    if snapshot
        .battery
        .map_or(false, |b| b.is_discharging_below(LOW_BATTERY_LEVEL))
    {
        concurrency *= 0.6;
    }

    let concurrency = if concurrency.is_finite() {
        concurrency.floor().max(0.0) as u32
    } else {
        0
    };
    concurrency.clamp(MIN_DEVICE_CONCURRENCY, MAX_DEVICE_CONCURRENCY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticBenchmark;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};
    use vassago_core::{HeapUsage, ManualSensors};

    fn desktop(hardware_score: f64, cores: u32) -> DeviceSnapshot {
        DeviceSnapshot {
            hardware_score,
            cpu_cores: cores,
            ..DeviceSnapshot::default()
        }
    }

    #[test]
    fn test_scores_from_sensors() {
        let sensors = Arc::new(ManualSensors::new().with_cores(4).with_memory_gb(4.0));
        let probe = DeviceMetricsProbe::new(sensors);
        let snapshot = probe.snapshot();

        assert_eq!(snapshot.cpu_score, 50.0);
        assert_eq!(snapshot.memory_score, 50.0);
        assert_eq!(snapshot.hardware_score, 50.0);
        assert_eq!(snapshot.device_type, DeviceType::Desktop);
        assert!(!snapshot.calibrated);
    }

    #[test]
    fn test_missing_sensors_use_defaults() {
        let probe = DeviceMetricsProbe::new(Arc::new(ManualSensors::new()));
        let snapshot = probe.snapshot();

        assert_eq!(snapshot.cpu_cores, DeviceMetricsProbe::DEFAULT_CORES);
        assert_eq!(snapshot.memory_score, DeviceMetricsProbe::DEFAULT_MEMORY_SCORE);
        assert_eq!(snapshot.hardware_score, 60.0);
        assert!(!probe.capabilities().device_memory);
    }

    #[test]
    fn test_scores_saturate() {
        assert_eq!(cpu_score(32), 100.0);
        assert_eq!(memory_score(64.0), 100.0);
    }

    #[test]
    fn test_calibrate_blends_benchmark() {
        let sensors = Arc::new(ManualSensors::new().with_cores(8).with_memory_gb(8.0));
        let probe = DeviceMetricsProbe::new(sensors);

        // 800ms scores 80
        let score = probe.calibrate(&StaticBenchmark::elapsed(Duration::from_millis(800)));
        assert!((score - (0.7 * 80.0 + 0.15 * 100.0 + 0.15 * 100.0)).abs() < 1e-9);
        assert!(probe.snapshot().calibrated);
    }

    #[test]
    fn test_calibrate_failure_falls_back() {
        let sensors = Arc::new(ManualSensors::new().with_cores(2).with_memory_gb(8.0));
        let probe = DeviceMetricsProbe::new(sensors);

        let score = probe.calibrate(&StaticBenchmark::failing("unsupported"));
        assert_eq!(score, 0.5 * 25.0 + 0.5 * 100.0);
        assert!(!probe.snapshot().calibrated);
    }

    /// Signals when it starts, then sleeps
    struct SlowBenchmark {
        started: Mutex<mpsc::Sender<()>>,
        duration: Duration,
    }

    impl Microbenchmark for SlowBenchmark {
        fn run(&self) -> crate::Result<Duration> {
            let _ = self
                .started
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .send(());
            std::thread::sleep(self.duration);
            Ok(self.duration)
        }
    }

    #[test]
    fn test_snapshot_readable_during_calibration() {
        let sensors = Arc::new(ManualSensors::new().with_cores(8).with_memory_gb(8.0));
        let probe = Arc::new(DeviceMetricsProbe::new(sensors));
        let (tx, rx) = mpsc::channel();
        let benchmark = SlowBenchmark {
            started: Mutex::new(tx),
            duration: Duration::from_millis(600),
        };

        let calibrating = {
            let probe = probe.clone();
            std::thread::spawn(move || probe.calibrate(&benchmark))
        };
        rx.recv().unwrap();

        let start = Instant::now();
        let during = probe.snapshot();
        let waited = start.elapsed();
        assert!(waited < Duration::from_millis(100), "snapshot waited {:?}", waited);
        assert!(!during.calibrated);
        assert!(probe.recommended_concurrency() >= MIN_DEVICE_CONCURRENCY);

        calibrating.join().unwrap();
        assert!(probe.snapshot().calibrated);
    }

    #[test]
    fn test_refresh_rereads_battery() {
        let sensors = Arc::new(
            ManualSensors::new()
                .with_cores(8)
                .with_battery(BatteryStatus::new(0.8, false)),
        );
        let probe = DeviceMetricsProbe::new(sensors.clone());
        assert_eq!(probe.snapshot().battery, Some(BatteryStatus::new(0.8, false)));

        sensors.set_battery(Some(BatteryStatus::new(0.05, false)));
        probe.refresh();
        assert_eq!(probe.snapshot().battery, Some(BatteryStatus::new(0.05, false)));
        // 8 cores, hardware score 85: min(8, 9) * 0.6
        assert_eq!(probe.recommended_concurrency(), 4);
    }

    #[test]
    fn test_refresh_without_sensors_keeps_snapshot() {
        let snapshot = DeviceSnapshot {
            battery: Some(BatteryStatus::new(0.5, true)),
            ..DeviceSnapshot::default()
        };
        let probe = DeviceMetricsProbe::from_snapshot(snapshot.clone());
        probe.refresh();
        assert_eq!(probe.snapshot(), snapshot);
    }

    #[test]
    fn test_concurrency_limited_by_cores() {
        assert_eq!(device_concurrency(&desktop(100.0, 4)), 4);
        assert_eq!(device_concurrency(&desktop(100.0, 32)), 10);
        assert_eq!(device_concurrency(&desktop(55.0, 32)), 6);
    }

    #[test]
    fn test_concurrency_floor_and_ceiling() {
        assert_eq!(device_concurrency(&desktop(0.0, 1)), MIN_DEVICE_CONCURRENCY);

        let mobile = DeviceSnapshot {
            device_type: DeviceType::Mobile,
            ..desktop(100.0, 8)
        };
        assert_eq!(device_concurrency(&mobile), 4);
    }

    #[test]
    fn test_low_battery_derates_concurrency() {
        let mut snapshot = desktop(100.0, 16);
        snapshot.battery = Some(BatteryStatus::new(0.1, false));
        assert_eq!(device_concurrency(&snapshot), 6);

        snapshot.battery = Some(BatteryStatus::new(0.1, true));
        assert_eq!(device_concurrency(&snapshot), 10);
    }

    #[test]
    fn test_memory_pressure() {
        let sensors = Arc::new(ManualSensors::new().with_heap(HeapUsage {
            used_bytes: 3,
            limit_bytes: 4,
        }));
        let probe = DeviceMetricsProbe::new(sensors);
        assert_eq!(probe.memory_pressure(), Some(0.75));

        let bare = DeviceMetricsProbe::from_snapshot(DeviceSnapshot::default());
        assert_eq!(bare.memory_pressure(), None);
    }

    #[tokio::test]
    async fn test_listen_follows_battery_events() {
        let sensors = Arc::new(ManualSensors::new().with_cores(8));
        let probe = Arc::new(DeviceMetricsProbe::new(sensors.clone()));
        assert!(probe.listen());

        sensors.set_battery(Some(BatteryStatus::new(0.05, false)));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(probe.snapshot().battery, Some(BatteryStatus::new(0.05, false)));

        probe.cleanup();
        sensors.set_battery(Some(BatteryStatus::new(0.9, true)));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(probe.snapshot().battery, Some(BatteryStatus::new(0.05, false)));
    }
}
