//! Bounded performance history and bucket analysis

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vassago_core::{PerformanceSample, RingBuffer};

/// Smallest load time used when scoring, in ms
const MIN_LOAD_TIME_MS: f64 = 1.0;

/// Aggregate of the samples that fell into one batch size bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    /// Bucket lower edge, `floor(batch_size / width) * width`
    pub group: u32,
    /// Samples in the bucket
    pub samples: usize,
    /// Mean success rate
    pub avg_success_rate: f64,
    /// Mean load time in ms
    pub avg_load_time_ms: f64,
    /// `avg_success_rate * 10000 / avg_load_time_ms`
    pub score: f64,
}

/// Recent load outcomes reported by the caller
#[derive(Debug, Clone)]
pub struct PerformanceHistory {
    samples: RingBuffer<PerformanceSample>,
}

impl PerformanceHistory {
    /// Create a history keeping `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: RingBuffer::new(capacity),
        }
    }

    /// Append a sample, evicting the oldest when full
    pub fn record(&mut self, sample: PerformanceSample) {
        self.samples.push(sample);
    }

    /// Number of samples held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in insertion order
    pub fn samples(&self) -> Vec<PerformanceSample> {
        self.samples.to_vec()
    }

    /// Drop all samples
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Mean success rate
    pub fn average_success_rate(&self) -> Option<f64> {
        self.mean(|s| s.success_rate)
    }

    /// Mean load time in ms
    pub fn average_load_time(&self) -> Option<f64> {
        self.mean(|s| s.load_time_ms)
    }

    fn mean(&self, field: impl Fn(&PerformanceSample) -> f64) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().map(field).sum::<f64>() / self.samples.len() as f64)
    }

    /// Group samples into buckets of `width`, ordered by group
    pub fn buckets(&self, width: u32) -> Vec<BucketStats> {
        let width = width.max(1);
        let mut sums: BTreeMap<u32, (usize, f64, f64)> = BTreeMap::new();

        for sample in self.samples.iter() {
            let entry = sums.entry(bucket_of(sample.batch_size, width)).or_default();
            entry.0 += 1;
            entry.1 += sample.success_rate;
            entry.2 += sample.load_time_ms;
        }

        sums.into_iter()
            .map(|(group, (count, success, load))| {
                let avg_success_rate = success / count as f64;
                let avg_load_time_ms = load / count as f64;
                BucketStats {
                    group,
                    samples: count,
                    avg_success_rate,
                    avg_load_time_ms,
                    score: avg_success_rate * 10_000.0 / avg_load_time_ms.max(MIN_LOAD_TIME_MS),
                }
            })
            .collect()
    }

    /// Highest scoring bucket; the smaller group wins ties
    pub fn best_bucket(&self, width: u32) -> Option<BucketStats> {
        self.buckets(width)
            .into_iter()
            .fold(None, |best: Option<BucketStats>, bucket| match best {
                Some(b) if b.score >= bucket.score => Some(b),
                _ => Some(bucket),
            })
    }
}

/// Bucket lower edge for a batch size
pub fn bucket_of(batch_size: u32, width: u32) -> u32 {
    let width = width.max(1);
    batch_size / width * width
}
