//! Per-resource usage statistics

use crate::resource::{ResourcePerformance, ResourceType};
use dashmap::DashMap;
use serde::Serialize;
use vassago_core::{now_ms, RingBuffer};

/// Usage statistics for one normalized resource
#[derive(Debug, Clone, Serialize)]
pub struct ResourceUsageStat {
    /// Resource type from the latest record
    pub resource_type: ResourceType,
    /// Times the resource was used
    pub usage_count: u64,
    /// Last use (unix ms)
    pub last_used: u64,
    /// Recent fetch times in ms
    pub load_time_history: RingBuffer<f64>,
    /// Mean of `load_time_history`
    pub avg_load_time_ms: f64,
}

impl ResourceUsageStat {
    fn new(resource_type: ResourceType, history_size: usize) -> Self {
        Self {
            resource_type,
            usage_count: 0,
            last_used: 0,
            load_time_history: RingBuffer::new(history_size),
            avg_load_time_ms: 0.0,
        }
    }

    fn record(&mut self, resource_type: ResourceType, perf: &ResourcePerformance) {
        self.resource_type = resource_type;
        self.usage_count += 1;
        self.last_used = now_ms();

        if perf.load_time_ms.is_finite() && perf.load_time_ms >= 0.0 {
            self.load_time_history.push(perf.load_time_ms);
            let n = self.load_time_history.len() as f64;
            self.avg_load_time_ms = self.load_time_history.iter().sum::<f64>() / n;
        }
    }
}

/// Usage statistics keyed by normalized URL
pub struct UsageTracker {
    stats: DashMap<String, ResourceUsageStat>,
    history_size: usize,
}

impl UsageTracker {
    /// Create a tracker keeping `history_size` load times per resource
    pub fn new(history_size: usize) -> Self {
        Self {
            stats: DashMap::new(),
            history_size: history_size.max(1),
        }
    }

    /// Record one use, returning the new usage count
    pub fn record(&self, key: &str, resource_type: ResourceType, perf: &ResourcePerformance) -> u64 {
        let mut stat = self
            .stats
            .entry(key.to_string())
            .or_insert_with(|| ResourceUsageStat::new(resource_type, self.history_size));
        stat.record(resource_type, perf);
        stat.usage_count
    }

    /// Statistics for a key
    pub fn get(&self, key: &str) -> Option<ResourceUsageStat> {
        self.stats.get(key).map(|r| r.value().clone())
    }

    /// Usage count for a key, zero if unknown
    pub fn usage_count(&self, key: &str) -> u64 {
        self.stats.get(key).map_or(0, |r| r.usage_count)
    }

    /// Most used resources, highest count first
    pub fn top_resources(&self, n: usize) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = self
            .stats
            .iter()
            .map(|r| (r.key().clone(), r.usage_count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }

    /// Tracked resources
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Forget all statistics
    pub fn clear(&self) {
        self.stats.clear();
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new(10)
    }
}
