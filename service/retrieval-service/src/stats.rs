//! Running aggregates for the retrieval engine, exposed read-only.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

#[derive(Default)]
pub struct StatsCollector {
    queries: AtomicU64,
    cache_hits: AtomicU64,
    failures: AtomicU64,
    hit_latency_us: AtomicU64,
    miss_latency_us: AtomicU64,
}

/// Point-in-time snapshot of engine counters, serializable for status
/// endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineStats {
    pub queries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub failures: u64,
    pub cache_hit_rate: f64,
    pub avg_hit_latency_us: u64,
    pub avg_miss_latency_us: u64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self, elapsed: Duration) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        self.hit_latency_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_miss(&self, elapsed: Duration) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.miss_latency_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineStats {
        let queries = self.queries.load(Ordering::Relaxed);
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let misses = queries.saturating_sub(hits).saturating_sub(failures);
        let hit_us = self.hit_latency_us.load(Ordering::Relaxed);
        let miss_us = self.miss_latency_us.load(Ordering::Relaxed);
        EngineStats {
            queries,
            cache_hits: hits,
            cache_misses: misses,
            failures,
            cache_hit_rate: if queries > 0 {
                hits as f64 / queries as f64
            } else {
                0.0
            },
            avg_hit_latency_us: if hits > 0 { hit_us / hits } else { 0 },
            avg_miss_latency_us: if misses > 0 { miss_us / misses } else { 0 },
        }
    }
}
