//! Governor and scorer benchmarks
//!
//! Benchmarks cover:
//! - Batch size recomputation with a growing performance history
//! - Concurrency recomputation
//! - Priority scoring with learned usage and navigation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use vassago::{
    BatchConfig, BatchSizeGovernor, BatteryStatus, ConcurrencyConfig, ConcurrencyGovernor,
    DeviceMetricsProbe, DeviceSnapshot, EffectiveType, NetworkMetricsProbe, NetworkProbeConfig,
    NetworkSnapshot, PerformanceSample, ResourcePerformance, ResourcePriorityScorer, ResourceRef,
    ResourceType, ScorerConfig, ScoringContext,
};

fn probes() -> (Arc<DeviceMetricsProbe>, Arc<NetworkMetricsProbe>) {
    let device = DeviceSnapshot {
        hardware_score: 72.0,
        cpu_cores: 8,
        battery: Some(BatteryStatus::new(0.15, false)),
        ..DeviceSnapshot::default()
    };
    let network = NetworkSnapshot {
        effective_type: EffectiveType::ThreeG,
        downlink_mbps: 1.6,
        ..NetworkSnapshot::default()
    };
    (
        Arc::new(DeviceMetricsProbe::from_snapshot(device)),
        Arc::new(NetworkMetricsProbe::from_snapshot(
            network,
            NetworkProbeConfig::default(),
        )),
    )
}

fn bench_batch_governor(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_governor");

    for history in [0usize, 10, 50] {
        let (device, network) = probes();
        let config = BatchConfig {
            performance_history_size: history.max(1),
            enable_auto_update: false,
            ..BatchConfig::default()
        };
        let governor = BatchSizeGovernor::new(config, device, network).unwrap();
        for i in 0..history {
            let batch = 5 + (i as u32 * 7) % 45;
            governor.record_performance(PerformanceSample::new(
                batch,
                80.0 + batch as f64 * 12.0,
                0.8 + (i % 5) as f64 * 0.04,
                batch,
            ));
        }

        group.bench_function(BenchmarkId::new("update_batch_size", history), |b| {
            b.iter(|| black_box(governor.update_batch_size()))
        });
    }

    group.finish();
}

fn bench_concurrency_governor(c: &mut Criterion) {
    let (device, network) = probes();
    let governor = ConcurrencyGovernor::new(
        ConcurrencyConfig::default().with_auto_update(false),
        device,
        network,
    )
    .unwrap();
    for _ in 0..10 {
        governor.record_performance_result(PerformanceSample::new(20, 400.0, 0.97, 20));
    }

    c.bench_function("update_concurrency_settings", |b| {
        b.iter(|| black_box(governor.update_concurrency_settings()))
    });
}

fn bench_scorer(c: &mut Criterion) {
    let mut group = c.benchmark_group("priority_scorer");
    let scorer = ResourcePriorityScorer::new(ScorerConfig::default()).unwrap();

    let pages = ["/", "/products", "/cart", "/checkout"];
    for (i, page) in pages.iter().enumerate() {
        scorer.set_current_page(page);
        for j in 0..25 {
            scorer.record_resource_usage(
                &format!("/assets/{}/{}.js", i, j),
                ResourceType::Script,
                ResourcePerformance::new(40.0 + j as f64),
            );
        }
        scorer.record_navigation(page, pages[(i + 1) % pages.len()]);
    }
    scorer.set_current_page("/");

    let learned = ResourceRef::from_url("/assets/1/3.js");
    let cold = ResourceRef::new("/fonts/body.woff2", ResourceType::Font);
    let ctx = ScoringContext::new().in_viewport();

    group.bench_function("score/learned", |b| {
        b.iter(|| black_box(scorer.score(black_box(&learned), &ctx)))
    });
    group.bench_function("score/cold", |b| {
        b.iter(|| black_box(scorer.score(black_box(&cold), &ctx)))
    });

    let candidates: Vec<ResourceRef> = (0..100)
        .map(|i| ResourceRef::from_url(format!("/assets/{}/{}.js", i % 4, i % 30)))
        .collect();
    group.bench_function("rank/100", |b| {
        b.iter(|| black_box(scorer.rank(black_box(&candidates), &ctx)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_batch_governor,
    bench_concurrency_governor,
    bench_scorer
);
criterion_main!(benches);
