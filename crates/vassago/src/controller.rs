//! Load controller

use crate::config::ControllerConfig;
use crate::report::PerformanceReport;
use crate::Result;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};
use vassago_core::{Capabilities, NetworkSnapshot, PerformanceSample, PlatformSensors, TaskHandle};
use vassago_governor::{BatchSizeGovernor, ConcurrencyGovernor};
use vassago_priority::{
    ResourcePerformance, ResourcePriorityScorer, ResourceRef, ResourceType, ScoringContext,
};
use vassago_probe::{
    ArithmeticBenchmark, BandwidthReport, DeviceMetricsProbe, HttpProbeTransport, Microbenchmark,
    NetworkMetricsProbe, ProbeTransport,
};

/// Adaptive resource loading controller
///
/// Owns both probes, both governors and the priority scorer for one page or
/// session. All reads are synchronous; `calibrate` and `measure_bandwidth`
/// are the only suspending operations. `cleanup` is the single cancellation
/// point for every timer and listener.
pub struct LoadController {
    config: ControllerConfig,
    device: Arc<DeviceMetricsProbe>,
    network: Arc<NetworkMetricsProbe>,
    concurrency: Arc<ConcurrencyGovernor>,
    batch: Arc<BatchSizeGovernor>,
    scorer: ResourcePriorityScorer,
    benchmark: Arc<dyn Microbenchmark>,
    battery_poll: Mutex<Option<TaskHandle>>,
}

impl LoadController {
    /// Create a controller reading the given sensors
    ///
    /// Bandwidth probing uses HTTP when `network.probe_url` is set.
    pub fn new(config: ControllerConfig, sensors: Arc<dyn PlatformSensors>) -> Result<Self> {
        let transport = match &config.network.probe_url {
            Some(url) => {
                let http = HttpProbeTransport::new(url, config.network.timeout())?;
                Some(Arc::new(http) as Arc<dyn ProbeTransport>)
            }
            None => None,
        };
        let benchmark = Arc::new(ArithmeticBenchmark::new(config.benchmark_iterations));

        Self::with_parts(config, sensors, transport, benchmark)
    }

    /// Create a controller with an explicit transport and benchmark
    pub fn with_parts(
        config: ControllerConfig,
        sensors: Arc<dyn PlatformSensors>,
        transport: Option<Arc<dyn ProbeTransport>>,
        benchmark: Arc<dyn Microbenchmark>,
    ) -> Result<Self> {
        config.validate()?;

        let device = Arc::new(DeviceMetricsProbe::new(sensors.clone()));
        let mut network = NetworkMetricsProbe::new(sensors, config.network.clone());
        if let Some(transport) = transport {
            network = network.with_transport(transport);
        }

        Self::assemble(config, device, Arc::new(network), benchmark)
    }

    /// Create a controller around existing probes
    pub fn from_probes(
        config: ControllerConfig,
        device: Arc<DeviceMetricsProbe>,
        network: Arc<NetworkMetricsProbe>,
    ) -> Result<Self> {
        config.validate()?;
        let benchmark = Arc::new(ArithmeticBenchmark::new(config.benchmark_iterations));
        Self::assemble(config, device, network, benchmark)
    }

    fn assemble(
        config: ControllerConfig,
        device: Arc<DeviceMetricsProbe>,
        network: Arc<NetworkMetricsProbe>,
        benchmark: Arc<dyn Microbenchmark>,
    ) -> Result<Self> {
        let concurrency = Arc::new(ConcurrencyGovernor::new(
            config.concurrency.clone(),
            device.clone(),
            network.clone(),
        )?);
        let batch = Arc::new(BatchSizeGovernor::new(
            config.batch.clone(),
            device.clone(),
            network.clone(),
        )?);
        let scorer = ResourcePriorityScorer::new(config.scorer.clone())?;

        info!(
            "Load controller ready: concurrency {}, batch size {}",
            concurrency.recommended_concurrency(),
            batch.current_batch_size()
        );

        Ok(Self {
            config,
            device,
            network,
            concurrency,
            batch,
            scorer,
            benchmark,
            battery_poll: Mutex::new(None),
        })
    }

    /// Controller configuration
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Start governor timers and platform listeners
    ///
    /// Without battery events the device probe is re-read on the
    /// concurrency update period instead. Returns `true` if at least one
    /// governor timer is running.
    pub fn start(&self) -> bool {
        let battery = self.device.listen();
        let connection = self.network.listen();
        debug!(
            "Platform listeners: battery {}, connection {}",
            battery, connection
        );

        if !battery && self.device.capabilities().battery {
            self.start_battery_poll();
        }

        let concurrency = self.concurrency.start_auto_update();
        let batch = self.batch.start_auto_update();
        concurrency || batch
    }

    fn start_battery_poll(&self) {
        let mut slot = self.battery_poll.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().map_or(false, |task| task.is_active()) {
            return;
        }

        let device = Arc::downgrade(&self.device);
        *slot = TaskHandle::repeating(
            "battery-poll",
            self.config.concurrency.update_interval(),
            move || match device.upgrade() {
                Some(device) => {
                    device.refresh();
                    true
                }
                None => false,
            },
        );
    }

    /// Cancel every timer and listener
    ///
    /// Getters keep returning the last computed values.
    pub fn cleanup(&self) {
        if let Some(mut task) = self
            .battery_poll
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.cancel();
        }
        self.concurrency.cleanup();
        self.batch.cleanup();
        self.device.cleanup();
        self.network.cleanup();
        debug!("Load controller cleaned up");
    }

    /// Run the calibration benchmark off the async runtime
    ///
    /// Recomputes both governors afterwards and returns the hardware score.
    pub async fn calibrate(&self) -> f64 {
        let device = self.device.clone();
        let benchmark = self.benchmark.clone();

        let score =
            match tokio::task::spawn_blocking(move || device.calibrate(benchmark.as_ref())).await {
                Ok(score) => score,
                Err(e) => {
                    warn!("Calibration task failed: {}", e);
                    self.device.snapshot().hardware_score
                }
            };

        self.recompute();
        score
    }

    /// Run a bandwidth sweep and recompute on success
    pub async fn measure_bandwidth(&self) -> Option<BandwidthReport> {
        let report = self.network.measure_bandwidth().await;
        if report.is_some() {
            self.recompute();
        }
        report
    }

    /// Re-read battery and connection info and recompute
    pub fn refresh(&self) {
        self.device.refresh();
        self.network.refresh();
        self.recompute();
    }

    /// Recompute both governors now
    pub fn recompute(&self) {
        self.concurrency.update_concurrency_settings();
        self.batch.update_batch_size();
    }

    /// Report the outcome of a load wave to both governors
    pub fn record_performance(&self, sample: PerformanceSample) {
        self.concurrency.record_performance_result(sample.clone());
        self.batch.record_performance(sample);
    }

    /// Current batch size
    pub fn current_batch_size(&self) -> u32 {
        self.batch.current_batch_size()
    }

    /// Recommended parallel request count
    pub fn recommended_concurrency(&self) -> u32 {
        self.concurrency.recommended_concurrency()
    }

    /// Fetch priority of a resource, 0.0 - 1.0
    pub fn calculate_priority_factor(&self, resource: &ResourceRef, context: &ScoringContext) -> f64 {
        self.scorer.calculate_priority_factor(resource, context)
    }

    /// Record that a resource was loaded on the current page
    pub fn record_resource_usage(
        &self,
        url: &str,
        resource_type: ResourceType,
        perf: ResourcePerformance,
    ) {
        self.scorer.record_resource_usage(url, resource_type, perf);
    }

    /// Record a page transition
    pub fn record_navigation(&self, from: &str, to: &str) {
        self.scorer.record_navigation(from, to);
    }

    /// Current network snapshot
    pub fn network_metrics(&self) -> NetworkSnapshot {
        self.network.snapshot()
    }

    /// Combined view of snapshots and recommendations
    pub fn performance_score(&self) -> PerformanceReport {
        let capabilities = Capabilities {
            connection: self.network.capabilities().connection,
            ..self.device.capabilities()
        };

        PerformanceReport::new(
            self.device.snapshot(),
            self.network.snapshot(),
            capabilities,
            self.recommended_concurrency(),
            self.current_batch_size(),
        )
    }

    /// Device probe
    pub fn device(&self) -> &Arc<DeviceMetricsProbe> {
        &self.device
    }

    /// Network probe
    pub fn network(&self) -> &Arc<NetworkMetricsProbe> {
        &self.network
    }

    /// Concurrency governor
    pub fn concurrency_governor(&self) -> &Arc<ConcurrencyGovernor> {
        &self.concurrency
    }

    /// Batch size governor
    pub fn batch_governor(&self) -> &Arc<BatchSizeGovernor> {
        &self.batch
    }

    /// Priority scorer
    pub fn scorer(&self) -> &ResourcePriorityScorer {
        &self.scorer
    }
}

impl Drop for LoadController {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vassago_core::{BatteryStatus, ConnectionInfo, EffectiveType, HeapUsage, ManualSensors};
    use vassago_probe::StaticBenchmark;

    /// Battery readable on demand, without change notifications
    struct PolledSensors {
        battery: Mutex<Option<BatteryStatus>>,
    }

    impl PolledSensors {
        fn new(battery: BatteryStatus) -> Self {
            Self {
                battery: Mutex::new(Some(battery)),
            }
        }

        fn set(&self, battery: BatteryStatus) {
            *self.battery.lock().unwrap() = Some(battery);
        }
    }

    impl PlatformSensors for PolledSensors {
        fn hardware_concurrency(&self) -> Option<u32> {
            Some(8)
        }

        fn device_memory_gb(&self) -> Option<f64> {
            Some(8.0)
        }

        fn battery(&self) -> Option<BatteryStatus> {
            *self.battery.lock().unwrap()
        }

        fn connection(&self) -> Option<ConnectionInfo> {
            None
        }

        fn heap_usage(&self) -> Option<HeapUsage> {
            None
        }
    }

    fn polled_controller(sensors: Arc<PolledSensors>) -> LoadController {
        LoadController::with_parts(
            ControllerConfig::default()
                .with_auto_update(false)
                .with_update_interval_ms(1_000),
            sensors,
            None,
            Arc::new(StaticBenchmark::failing("unused")),
        )
        .unwrap()
    }

    fn sensors() -> Arc<ManualSensors> {
        Arc::new(ManualSensors::new().with_cores(8).with_memory_gb(8.0))
    }

    #[test]
    fn test_new_without_probe_url() {
        let controller =
            LoadController::new(ControllerConfig::default(), sensors()).unwrap();
        assert!(!controller.network().can_measure());
        assert!(controller.current_batch_size() >= 5);
    }

    #[test]
    fn test_new_rejects_bad_probe_url() {
        let config = ControllerConfig::default().with_probe_url("not a url");
        assert!(LoadController::new(config, sensors()).is_err());
    }

    #[tokio::test]
    async fn test_calibrate_recomputes() {
        let controller = LoadController::with_parts(
            ControllerConfig::default().with_auto_update(false),
            sensors(),
            None,
            Arc::new(StaticBenchmark::elapsed(Duration::from_millis(800))),
        )
        .unwrap();
        let before = controller.batch_governor().adjustment_history().len();

        let score = controller.calibrate().await;

        assert!((score - 86.0).abs() < 1e-9);
        assert!(controller.performance_score().device.calibrated);
        assert_eq!(controller.batch_governor().adjustment_history().len(), before + 1);
    }

    #[test]
    fn test_refresh_picks_up_connection() {
        let sensors = sensors();
        let controller = LoadController::with_parts(
            ControllerConfig::default(),
            sensors.clone(),
            None,
            Arc::new(StaticBenchmark::failing("unused")),
        )
        .unwrap();
        assert_eq!(controller.network_metrics().effective_type, EffectiveType::Unknown);

        sensors.set_connection(
            ConnectionInfo::new("cellular").with_effective_type(EffectiveType::TwoG),
        );
        controller.refresh();

        assert_eq!(controller.network_metrics().effective_type, EffectiveType::TwoG);
        // 0.3 * 8 + 0.6 * 3
        assert_eq!(controller.recommended_concurrency(), 4);
    }

    #[test]
    fn test_record_performance_feeds_both_governors() {
        let controller = LoadController::new(ControllerConfig::default(), sensors()).unwrap();
        controller.record_performance(PerformanceSample::new(20, 300.0, 1.0, 20));

        assert_eq!(controller.batch_governor().performance_history().len(), 1);
        assert_eq!(controller.concurrency_governor().performance_history().len(), 1);
    }

    #[test]
    fn test_refresh_picks_up_battery() {
        let sensors = Arc::new(PolledSensors::new(BatteryStatus::new(0.8, false)));
        let controller = polled_controller(sensors.clone());
        let full = controller.current_batch_size();

        sensors.set(BatteryStatus::new(0.05, false));
        controller.refresh();

        assert_eq!(
            controller.performance_score().device.battery,
            Some(BatteryStatus::new(0.05, false))
        );
        assert!(controller.current_batch_size() < full);
    }

    #[tokio::test(start_paused = true)]
    async fn test_battery_polled_without_events() {
        let sensors = Arc::new(PolledSensors::new(BatteryStatus::new(0.8, false)));
        let controller = polled_controller(sensors.clone());
        assert!(!controller.start());

        sensors.set(BatteryStatus::new(0.15, false));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(
            controller.device().snapshot().battery,
            Some(BatteryStatus::new(0.15, false))
        );

        controller.cleanup();
        sensors.set(BatteryStatus::new(0.05, false));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(
            controller.device().snapshot().battery,
            Some(BatteryStatus::new(0.15, false))
        );
    }

    #[test]
    fn test_usage_and_navigation_reach_scorer() {
        let controller = LoadController::new(ControllerConfig::default(), sensors()).unwrap();
        controller.scorer().set_current_page("/home");

        controller.record_resource_usage(
            "/app.js?v=3",
            ResourceType::Script,
            ResourcePerformance::new(40.0),
        );
        controller.record_navigation("/home", "/docs");

        assert_eq!(controller.scorer().usage("/app.js").map(|u| u.usage_count), Some(1));
        assert_eq!(controller.scorer().current_page().as_deref(), Some("/docs"));
        assert!(controller.scorer().navigation_table().probability("/home", "/docs") > 0.99);
    }
}
