//! One-shot CPU microbenchmark

use crate::{ProbeError, Result};
use std::hint::black_box;
use std::time::{Duration, Instant};

/// A timed workload used to calibrate the hardware score
pub trait Microbenchmark: Send + Sync {
    /// Run the workload and return its wall time
    fn run(&self) -> Result<Duration>;
}

/// Fixed-iteration floating point loop
#[derive(Debug, Clone, Copy)]
pub struct ArithmeticBenchmark {
    iterations: u64,
}

impl ArithmeticBenchmark {
    /// Default iteration count
    pub const DEFAULT_ITERATIONS: u64 = 5_000_000;

    /// Create a benchmark with a custom iteration count
    pub fn new(iterations: u64) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    /// Iteration count
    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}

impl Default for ArithmeticBenchmark {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ITERATIONS)
    }
}

impl Microbenchmark for ArithmeticBenchmark {
    fn run(&self) -> Result<Duration> {
        let start = Instant::now();

        let mut acc = 0.0f64;
        for i in 0..self.iterations {
            let x = black_box(i as f64);
            acc += (x.sqrt() * 1.000_1).sin();
        }
        let acc = black_box(acc);

        let elapsed = start.elapsed();
        if !acc.is_finite() {
            return Err(ProbeError::Benchmark("accumulator overflowed".into()));
        }
        Ok(elapsed)
    }
}

/// Benchmark with a predetermined outcome
///
/// For hosts that time their own workload, and for tests.
#[derive(Debug, Clone)]
pub struct StaticBenchmark {
    outcome: std::result::Result<Duration, String>,
}

impl StaticBenchmark {
    /// Always report `elapsed`
    pub fn elapsed(elapsed: Duration) -> Self {
        Self {
            outcome: Ok(elapsed),
        }
    }

    /// Always fail
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            outcome: Err(reason.into()),
        }
    }
}

impl Microbenchmark for StaticBenchmark {
    fn run(&self) -> Result<Duration> {
        self.outcome.clone().map_err(ProbeError::Benchmark)
    }
}

/// Map a benchmark wall time to a 20-100 score
///
/// 500ms or faster scores 100; every further 15ms costs one point.
pub fn benchmark_score(elapsed: Duration) -> f64 {
    let ms = elapsed.as_secs_f64() * 1000.0;
    (100.0 - (ms - 500.0) / 15.0).clamp(20.0, 100.0)
}
