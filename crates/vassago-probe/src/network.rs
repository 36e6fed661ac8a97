//! Network quality probe

use crate::bandwidth::{trimmed_mean, ProbeTransport};
use crate::{ProbeError, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use vassago_core::{
    now_ms, Capabilities, ConnectionInfo, EffectiveType, NetworkSnapshot, PlatformSensors,
    TaskHandle,
};

/// Network probe configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkProbeConfig {
    /// Endpoint answering `?size=<bytes>` with that many bytes
    pub probe_url: Option<String>,
    /// Probe payload sizes in KB, fetched in order
    pub probe_sizes_kb: Vec<u32>,
    /// Per-probe timeout in ms
    pub timeout_ms: u64,
    /// Fraction of results trimmed from each end before averaging
    pub outlier_trim: f64,
}

impl Default for NetworkProbeConfig {
    fn default() -> Self {
        Self {
            probe_url: None,
            probe_sizes_kb: vec![1, 10, 50, 100],
            timeout_ms: 5000,
            outlier_trim: 0.2,
        }
    }
}

impl NetworkProbeConfig {
    /// Parse from JSON, filling gaps with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ProbeError::Configuration(format!("invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Set probe endpoint
    pub fn with_probe_url(mut self, url: impl Into<String>) -> Self {
        self.probe_url = Some(url.into());
        self
    }

    /// Set probe sizes
    pub fn with_probe_sizes_kb(mut self, sizes: Vec<u32>) -> Self {
        self.probe_sizes_kb = sizes;
        self
    }

    /// Set per-probe timeout
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Per-probe timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let result = self.check();
        if let Err(e) = &result {
            warn!("Rejecting network probe config: {}", e);
        }
        result
    }

    fn check(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(ProbeError::Configuration("timeout_ms must be > 0".into()));
        }
        if !(0.0..0.5).contains(&self.outlier_trim) {
            return Err(ProbeError::Configuration(format!(
                "outlier_trim must be in [0, 0.5), got {}",
                self.outlier_trim
            )));
        }
        if self.probe_sizes_kb.iter().any(|&kb| kb == 0) {
            return Err(ProbeError::Configuration("probe sizes must be > 0".into()));
        }
        Ok(())
    }
}

/// One successful bandwidth probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandwidthMeasurement {
    /// Requested payload size
    pub size_bytes: u64,
    /// Wall time of the fetch
    pub elapsed_ms: f64,
    /// Derived bandwidth
    pub bandwidth_mbps: f64,
}

/// Outcome of a bandwidth sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandwidthReport {
    /// Trimmed mean over successful probes
    pub bandwidth_mbps: f64,
    /// Classification of `bandwidth_mbps`
    pub effective_type: EffectiveType,
    /// Successful probes in fetch order
    pub measurements: Vec<BandwidthMeasurement>,
}

/// Samples network quality into a `NetworkSnapshot`
///
/// The passive path mirrors platform connection info; the active path runs
/// a sequential probe sweep. A sweep with no successful probe keeps the
/// previous snapshot.
pub struct NetworkMetricsProbe {
    config: NetworkProbeConfig,
    sensors: Option<Arc<dyn PlatformSensors>>,
    capabilities: Capabilities,
    transport: Option<Arc<dyn ProbeTransport>>,
    snapshot: RwLock<NetworkSnapshot>,
    listeners: Mutex<Vec<TaskHandle>>,
}

impl NetworkMetricsProbe {
    /// Create a probe reading the given sensors
    pub fn new(sensors: Arc<dyn PlatformSensors>, config: NetworkProbeConfig) -> Self {
        let capabilities = Capabilities::detect(sensors.as_ref());
        let probe = Self {
            config,
            sensors: Some(sensors),
            capabilities,
            transport: None,
            snapshot: RwLock::new(NetworkSnapshot::default()),
            listeners: Mutex::new(Vec::new()),
        };
        probe.refresh();
        probe
    }

    /// Create a probe around a fixed snapshot
    pub fn from_snapshot(snapshot: NetworkSnapshot, config: NetworkProbeConfig) -> Self {
        Self {
            config,
            sensors: None,
            capabilities: Capabilities {
                connection: true,
                ..Capabilities::none()
            },
            transport: None,
            snapshot: RwLock::new(snapshot),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Attach a transport for active probing
    pub fn with_transport(mut self, transport: Arc<dyn ProbeTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Probe configuration
    pub fn config(&self) -> &NetworkProbeConfig {
        &self.config
    }

    /// Optional APIs detected at construction
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Current snapshot
    pub fn snapshot(&self) -> NetworkSnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the snapshot holds anything beyond defaults
    pub fn has_data(&self) -> bool {
        self.capabilities.connection || self.snapshot().last_measured.is_some()
    }

    /// Whether an active probe sweep is possible
    pub fn can_measure(&self) -> bool {
        self.transport.is_some()
    }

    /// Mirror platform connection info into the snapshot
    pub fn apply_connection(&self, info: &ConnectionInfo) {
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);

        snapshot.connection_type = info.connection_type.clone();
        if let Some(downlink) = info.downlink_mbps.filter(|d| d.is_finite()) {
            snapshot.downlink_mbps = downlink.max(0.0);
        }
        if let Some(rtt) = info.rtt_ms.filter(|r| r.is_finite()) {
            snapshot.rtt_ms = rtt.max(0.0);
        }
        snapshot.effective_type = match (info.effective_type, info.downlink_mbps) {
            (Some(ty), _) if ty != EffectiveType::Unknown => ty,
            (_, Some(downlink)) if downlink > 0.0 => EffectiveType::from_bandwidth(downlink),
            _ => snapshot.effective_type,
        };
        snapshot.last_measured = Some(now_ms());

        debug!(
            "Connection: {} {} ({:.2} Mbps, {:.0}ms rtt)",
            snapshot.connection_type,
            snapshot.effective_type,
            snapshot.downlink_mbps,
            snapshot.rtt_ms
        );
    }

    /// Re-read platform connection info
    pub fn refresh(&self) {
        if let Some(info) = self.sensors.as_ref().and_then(|s| s.connection()) {
            self.apply_connection(&info);
        }
    }

    /// Concurrency this network can sustain on its own
    pub fn recommended_concurrency(&self) -> u32 {
        network_concurrency(&self.snapshot())
    }

    /// Run a sequential bandwidth sweep
    ///
    /// Failed and timed-out probes are dropped. Returns `None`, leaving the
    /// snapshot untouched, when no transport is configured or no probe
    /// succeeds.
    pub async fn measure_bandwidth(&self) -> Option<BandwidthReport> {
        let Some(transport) = self.transport.clone() else {
            debug!("No probe transport configured, skipping bandwidth sweep");
            return None;
        };

        let mut measurements = Vec::with_capacity(self.config.probe_sizes_kb.len());

        for &size_kb in &self.config.probe_sizes_kb {
            let size_bytes = size_kb as u64 * 1024;

            match self.probe_once(transport.as_ref(), size_bytes).await {
                Ok(Some(measurement)) => measurements.push(measurement),
                Ok(None) => debug!("Probe of {}KB completed instantly, ignoring", size_kb),
                Err(e) if e.is_transient() => {
                    warn!("Bandwidth probe of {}KB dropped: {}", size_kb, e)
                }
                Err(e) => {
                    warn!("Bandwidth probe of {}KB failed, ending sweep: {}", size_kb, e);
                    break;
                }
            }
        }

        let samples: Vec<f64> = measurements.iter().map(|m| m.bandwidth_mbps).collect();
        let Some(bandwidth_mbps) = trimmed_mean(&samples, self.config.outlier_trim) else {
            warn!("All bandwidth probes failed, keeping previous network snapshot");
            return None;
        };
        let effective_type = EffectiveType::from_bandwidth(bandwidth_mbps);

        {
            let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
            snapshot.downlink_mbps = bandwidth_mbps;
            snapshot.effective_type = effective_type;
            snapshot.last_measured = Some(now_ms());
        }

        info!(
            "Measured bandwidth {:.2} Mbps ({}) from {} probes",
            bandwidth_mbps,
            effective_type,
            measurements.len()
        );

        Some(BandwidthReport {
            bandwidth_mbps,
            effective_type,
            measurements,
        })
    }

    /// Fetch one probe payload under the configured timeout
    ///
    /// `Ok(None)` when the fetch took no measurable time.
    async fn probe_once(
        &self,
        transport: &dyn ProbeTransport,
        size_bytes: u64,
    ) -> Result<Option<BandwidthMeasurement>> {
        let start = Instant::now();
        tokio::time::timeout(self.config.timeout(), transport.fetch(size_bytes))
            .await
            .map_err(|_| ProbeError::Timeout(self.config.timeout_ms))??;

        let elapsed = start.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return Ok(None);
        }
        Ok(Some(BandwidthMeasurement {
            size_bytes,
            elapsed_ms: elapsed * 1000.0,
            bandwidth_mbps: size_bytes as f64 * 8.0 / elapsed / 1e6,
        }))
    }

    /// Follow connection change events
    pub fn listen(self: &Arc<Self>) -> bool {
        let Some(rx) = self.sensors.as_ref().and_then(|s| s.connection_events()) else {
            return false;
        };

        let probe = Arc::downgrade(self);
        let task = TaskHandle::watch("connection-listener", rx, move |info| {
            match probe.upgrade() {
                Some(probe) => {
                    probe.apply_connection(&info);
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

impl Drop for NetworkMetricsProbe {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Network-only concurrency recommendation
pub fn network_concurrency(snapshot: &NetworkSnapshot) -> u32 {
    let base: f64 = match snapshot.effective_type {
        EffectiveType::FourG => 8.0,
        EffectiveType::ThreeG => 6.0,
        EffectiveType::TwoG => 3.0,
        EffectiveType::Slow2G => 2.0,
        EffectiveType::Unknown => 4.0,
    };

    let scaled = if snapshot.downlink_mbps > 0.0 {
        base * (snapshot.downlink_mbps / 2.0).clamp(0.5, 2.0)
    } else {
        base
    };

    scaled.floor() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vassago_core::ManualSensors;

    /// Transport that sleeps a fixed time per probe, failing selected calls
    struct SleepTransport {
        per_probe: Duration,
        fail_calls: Vec<usize>,
        fail_status: Option<u16>,
        calls: AtomicUsize,
    }

    impl SleepTransport {
        fn new(per_probe: Duration) -> Self {
            Self {
                per_probe,
                fail_calls: Vec::new(),
                fail_status: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProbeTransport for SleepTransport {
        async fn fetch(&self, size_bytes: u64) -> Result<u64> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.per_probe).await;
            if self.fail_calls.contains(&call) {
                return Err(match self.fail_status {
                    Some(status) => ProbeError::Http {
                        status,
                        message: "rejected".into(),
                    },
                    None => ProbeError::Connection("reset".into()),
                });
            }
            Ok(size_bytes)
        }
    }

    fn snapshot(effective_type: EffectiveType, downlink_mbps: f64) -> NetworkSnapshot {
        NetworkSnapshot {
            effective_type,
            downlink_mbps,
            ..NetworkSnapshot::default()
        }
    }

    #[test]
    fn test_config_defaults_and_validation() {
        let config = NetworkProbeConfig::default();
        assert_eq!(config.probe_sizes_kb, vec![1, 10, 50, 100]);
        assert!(config.validate().is_ok());

        assert!(config.clone().with_timeout_ms(0).validate().is_err());
        let bad_trim = NetworkProbeConfig {
            outlier_trim: 0.5,
            ..NetworkProbeConfig::default()
        };
        assert!(bad_trim.validate().is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config = NetworkProbeConfig::from_json(r#"{"probe_sizes_kb": [4, 64]}"#).unwrap();
        assert_eq!(config.probe_sizes_kb, vec![4, 64]);
        assert_eq!(config.timeout_ms, 5_000);

        assert!(NetworkProbeConfig::from_json(r#"{"probe_sizes_kb": [0]}"#).is_err());
        assert!(NetworkProbeConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_concurrency_base_by_type() {
        assert_eq!(network_concurrency(&snapshot(EffectiveType::FourG, 0.0)), 8);
        assert_eq!(network_concurrency(&snapshot(EffectiveType::ThreeG, 0.0)), 6);
        assert_eq!(network_concurrency(&snapshot(EffectiveType::TwoG, 0.0)), 3);
        assert_eq!(network_concurrency(&snapshot(EffectiveType::Slow2G, 0.0)), 2);
        assert_eq!(network_concurrency(&snapshot(EffectiveType::Unknown, 0.0)), 4);
    }

    #[test]
    fn test_concurrency_downlink_scaling() {
        assert_eq!(network_concurrency(&snapshot(EffectiveType::FourG, 10.0)), 16);
        assert_eq!(network_concurrency(&snapshot(EffectiveType::ThreeG, 3.0)), 9);
        assert_eq!(network_concurrency(&snapshot(EffectiveType::TwoG, 0.2)), 1);
    }

    #[test]
    fn test_passive_path_mirrors_connection() {
        let sensors = Arc::new(ManualSensors::new().with_connection(
            ConnectionInfo::new("wifi")
                .with_downlink(1.5)
                .with_rtt(120.0),
        ));
        let probe = NetworkMetricsProbe::new(sensors, NetworkProbeConfig::default());
        let snapshot = probe.snapshot();

        assert_eq!(snapshot.connection_type, "wifi");
        assert_eq!(snapshot.downlink_mbps, 1.5);
        assert_eq!(snapshot.rtt_ms, 120.0);
        // Classified from downlink when the platform reports no type
        assert_eq!(snapshot.effective_type, EffectiveType::ThreeG);
        assert!(probe.has_data());
    }

    #[test]
    fn test_no_connection_api() {
        let probe = NetworkMetricsProbe::new(
            Arc::new(ManualSensors::new()),
            NetworkProbeConfig::default(),
        );
        assert!(!probe.has_data());
        assert_eq!(probe.snapshot(), NetworkSnapshot::default());
        assert_eq!(probe.recommended_concurrency(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_measure_bandwidth() {
        // 100ms per probe: 1KB -> 0.08192 Mbps ... 100KB -> 8.192 Mbps
        let transport = Arc::new(SleepTransport::new(Duration::from_millis(100)));
        let probe = NetworkMetricsProbe::from_snapshot(
            NetworkSnapshot::default(),
            NetworkProbeConfig::default(),
        )
        .with_transport(transport);

        let report = probe.measure_bandwidth().await.unwrap();
        assert_eq!(report.measurements.len(), 4);

        // floor(4 * 0.2) == 0, so all four probes are averaged
        let expected = (1.0 + 10.0 + 50.0 + 100.0) * 1024.0 * 8.0 / 0.1 / 1e6 / 4.0;
        assert!((report.bandwidth_mbps - expected).abs() < expected * 0.02);
        assert_eq!(report.effective_type, EffectiveType::ThreeG);

        let snapshot = probe.snapshot();
        assert_eq!(snapshot.effective_type, EffectiveType::ThreeG);
        assert!(snapshot.last_measured.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probes_are_dropped() {
        let transport = Arc::new(SleepTransport {
            fail_calls: vec![0, 2],
            ..SleepTransport::new(Duration::from_millis(100))
        });
        let probe = NetworkMetricsProbe::from_snapshot(
            NetworkSnapshot::default(),
            NetworkProbeConfig::default(),
        )
        .with_transport(transport);

        let report = probe.measure_bandwidth().await.unwrap();
        let sizes: Vec<u64> = report.measurements.iter().map(|m| m.size_bytes).collect();
        assert_eq!(sizes, vec![10 * 1024, 100 * 1024]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_probes_failing_keeps_snapshot() {
        let previous = NetworkSnapshot {
            connection_type: "cellular".into(),
            downlink_mbps: 3.0,
            rtt_ms: 80.0,
            effective_type: EffectiveType::ThreeG,
            last_measured: Some(42),
        };

        // Every probe outlives the 5s timeout
        let transport = Arc::new(SleepTransport::new(Duration::from_secs(30)));
        let probe =
            NetworkMetricsProbe::from_snapshot(previous.clone(), NetworkProbeConfig::default())
                .with_transport(transport);

        assert!(probe.measure_bandwidth().await.is_none());
        assert_eq!(probe.snapshot(), previous);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_probe_is_timeout() {
        let transport = SleepTransport::new(Duration::from_secs(30));
        let probe = NetworkMetricsProbe::from_snapshot(
            NetworkSnapshot::default(),
            NetworkProbeConfig::default().with_timeout_ms(2_000),
        );

        let err = probe.probe_once(&transport, 1024).await.unwrap_err();
        assert!(matches!(err, ProbeError::Timeout(2_000)));
        assert!(err.is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_ends_sweep() {
        let transport = Arc::new(SleepTransport {
            fail_calls: vec![1],
            fail_status: Some(404),
            ..SleepTransport::new(Duration::from_millis(100))
        });
        let probe = NetworkMetricsProbe::from_snapshot(
            NetworkSnapshot::default(),
            NetworkProbeConfig::default(),
        )
        .with_transport(transport.clone());

        let report = probe.measure_bandwidth().await.unwrap();
        assert_eq!(report.measurements.len(), 1);
        assert_eq!(report.measurements[0].size_bytes, 1024);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_are_skipped() {
        let transport = Arc::new(SleepTransport {
            fail_calls: vec![0, 1],
            fail_status: Some(503),
            ..SleepTransport::new(Duration::from_millis(100))
        });
        let probe = NetworkMetricsProbe::from_snapshot(
            NetworkSnapshot::default(),
            NetworkProbeConfig::default(),
        )
        .with_transport(transport.clone());

        let report = probe.measure_bandwidth().await.unwrap();
        assert_eq!(report.measurements.len(), 2);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_no_transport() {
        let probe = NetworkMetricsProbe::from_snapshot(
            NetworkSnapshot::default(),
            NetworkProbeConfig::default(),
        );
        assert!(!probe.can_measure());
        assert!(probe.measure_bandwidth().await.is_none());
    }

    #[tokio::test]
    async fn test_listen_follows_connection_events() {
        let sensors = Arc::new(ManualSensors::new());
        let probe = Arc::new(NetworkMetricsProbe::new(
            sensors.clone(),
            NetworkProbeConfig::default(),
        ));
        assert!(probe.listen());

        sensors.set_connection(
            ConnectionInfo::new("cellular").with_effective_type(EffectiveType::TwoG),
        );
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let snapshot = probe.snapshot();
        assert_eq!(snapshot.connection_type, "cellular");
        assert_eq!(snapshot.effective_type, EffectiveType::TwoG);
    }
}
