//! Lightweight in-process metrics: counters and timing summaries, exposed
//! as JSON at `/metrics`. No external dependencies, usable from tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;

/// Samples below this count report their max as the p95 estimate.
const MIN_SAMPLES_FOR_P95: usize = 20;

#[derive(Debug, Default)]
struct MetricsInner {
    counters: BTreeMap<String, u64>,
    timings: BTreeMap<String, Vec<f64>>,
}

/// Thread-safe metrics registry shared across request handlers.
#[derive(Debug, Default)]
pub struct Metrics {
    inner: Mutex<MetricsInner>,
}

/// Timing statistics for one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingSummary {
    pub count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub p95_ms: f64,
}

/// Snapshot of all metrics, shaped for the `/metrics` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub timings: BTreeMap<String, TimingSummary>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, metric: &str) {
        self.incr_by(metric, 1);
    }

    pub fn incr_by(&self, metric: &str, amount: u64) {
        let mut inner = self.inner.lock().expect("metrics lock is not poisoned");
        *inner.counters.entry(metric.to_owned()).or_insert(0) += amount;
    }

    pub fn timing(&self, metric: &str, value_ms: f64) {
        let mut inner = self.inner.lock().expect("metrics lock is not poisoned");
        inner
            .timings
            .entry(metric.to_owned())
            .or_default()
            .push(value_ms);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock().expect("metrics lock is not poisoned");

        let timings = inner
            .timings
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(name, values)| (name.clone(), summarize(values)))
            .collect();

        MetricsSnapshot {
            counters: inner.counters.clone(),
            timings,
        }
    }

    /// Reset all metrics. Test isolation only.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("metrics lock is not poisoned");
        inner.counters.clear();
        inner.timings.clear();
    }
}

fn summarize(values: &[f64]) -> TimingSummary {
    let count = values.len();
    let min_ms = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max_ms = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean_ms = values.iter().sum::<f64>() / count as f64;

    let p95_ms = if count >= MIN_SAMPLES_FOR_P95 {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).expect("timing values are finite"));
        let rank = ((count as f64) * 0.95).ceil() as usize;
        sorted[rank.clamp(1, count) - 1]
    } else {
        max_ms
    };

    TimingSummary {
        count,
        min_ms,
        max_ms,
        mean_ms,
        p95_ms,
    }
}
