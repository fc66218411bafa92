//! Per-source latency histograms for adapter invocations.
//! The fan-out executor records, the API reads.

use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

/// Values stored in milliseconds. Tracks 1ms to 10 minutes, 3 significant figures.
struct LatencyStats {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

impl LatencyStats {
    fn new() -> Option<Self> {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 600_000, 3).ok()?;
        Some(Self {
            inner: Mutex::new(histogram),
        })
    }

    fn record(&self, d: Duration) {
        let ms = d.as_millis().clamp(1, 600_000) as u64;
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(ms);
        }
    }

    fn snapshot(&self, source: &str) -> SourceLatencySnapshot {
        let empty = SourceLatencySnapshot {
            source: source.to_string(),
            sample_count: 0,
            p50_ms: None,
            p95_ms: None,
            p99_ms: None,
        };
        let Ok(h) = self.inner.lock() else {
            return empty;
        };
        if h.len() == 0 {
            return empty;
        }
        SourceLatencySnapshot {
            sample_count: h.len(),
            p50_ms: Some(h.value_at_quantile(0.5)),
            p95_ms: Some(h.value_at_quantile(0.95)),
            p99_ms: Some(h.value_at_quantile(0.99)),
            ..empty
        }
    }

    fn len(&self) -> u64 {
        self.inner.lock().map(|h| h.len()).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceLatencySnapshot {
    pub source: String,
    pub sample_count: u64,
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
}

/// source key → histogram. Created lazily on first sample.
#[derive(Default)]
pub struct SourceLatency {
    by_source: DashMap<String, LatencyStats>,
}

impl SourceLatency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, source: &str, d: Duration) {
        if let Some(stats) = self.by_source.get(source) {
            stats.record(d);
            return;
        }
        if let Some(stats) = LatencyStats::new() {
            self.by_source
                .entry(source.to_string())
                .or_insert(stats)
                .record(d);
        }
    }

    /// Sample count for one source.
    pub fn len(&self, source: &str) -> u64 {
        self.by_source.get(source).map(|s| s.len()).unwrap_or(0)
    }

    /// Percentiles for every source seen so far, sorted by key.
    pub fn snapshot(&self) -> Vec<SourceLatencySnapshot> {
        let mut out: Vec<SourceLatencySnapshot> = self
            .by_source
            .iter()
            .map(|e| e.value().snapshot(e.key()))
            .collect();
        out.sort_by(|a, b| a.source.cmp(&b.source));
        out
    }
}
