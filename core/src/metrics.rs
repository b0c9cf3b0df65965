//! Quantile aggregation over latency samples

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Quantile aggregation errors
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum QuantileError {
    /// Quantile outside `[0, 1)`
    #[error("q must be in [0, 1), got {0}")]
    OutOfRange(f64),

    /// No samples to aggregate
    #[error("cannot take a quantile of an empty sample set")]
    Empty,
}

/// Value at sorted rank `floor(n * q)` (zero-indexed)
///
/// The input is neither assumed sorted nor mutated.
pub fn quantile(xs: &[i64], q: f64) -> Result<i64, QuantileError> {
    if !(0.0..1.0).contains(&q) {
        return Err(QuantileError::OutOfRange(q));
    }
    if xs.is_empty() {
        return Err(QuantileError::Empty);
    }

    let mut sorted = xs.to_vec();
    sorted.sort_unstable();
    let rank = (sorted.len() as f64 * q).floor() as usize;
    Ok(sorted[rank.min(sorted.len() - 1)])
}

/// Latency summary (all values in nanoseconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencySummary {
    /// Number of samples
    pub count: usize,
    /// Minimum value
    pub min_ns: i64,
    /// 50th percentile
    pub p50_ns: i64,
    /// 90th percentile
    pub p90_ns: i64,
    /// 99th percentile
    pub p99_ns: i64,
    /// Maximum value
    pub max_ns: i64,
    /// Arithmetic mean
    pub mean_ns: f64,
}

impl LatencySummary {
    /// Summarize a non-empty set of latencies
    pub fn from_latencies(latencies: &[i64]) -> Result<Self, QuantileError> {
        let min_ns = *latencies.iter().min().ok_or(QuantileError::Empty)?;
        let max_ns = *latencies.iter().max().ok_or(QuantileError::Empty)?;
        let mean_ns = latencies.iter().map(|v| *v as f64).sum::<f64>() / latencies.len() as f64;

        Ok(Self {
            count: latencies.len(),
            min_ns,
            p50_ns: quantile(latencies, 0.5)?,
            p90_ns: quantile(latencies, 0.9)?,
            p99_ns: quantile(latencies, 0.99)?,
            max_ns,
            mean_ns,
        })
    }

    /// p90 in milliseconds
    pub fn p90_ms(&self) -> f64 {
        ns_to_ms(self.p90_ns)
    }
}

/// Convert nanoseconds to fractional milliseconds
pub fn ns_to_ms(ns: i64) -> f64 {
    ns as f64 / 1e6
}
