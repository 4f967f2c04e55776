//! End-of-run aggregates over a sample sequence.

use serde::Serialize;

/// Mean, extremes and population standard deviation of a sample set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleStats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation (variance divided by `count`).
    pub std_dev: f64,
}

impl SampleStats {
    /// Aggregate `samples`; `None` when there is nothing to aggregate.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let count = samples.len();
        let mean = samples.iter().sum::<f64>() / count as f64;
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let variance = samples.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / count as f64;
        Some(Self {
            count,
            mean,
            min,
            max,
            std_dev: variance.sqrt(),
        })
    }
}
