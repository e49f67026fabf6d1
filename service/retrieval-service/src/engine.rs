//! Retrieval engine facade: cache lookup, hybrid search, stats, health.
//!
//! All collaborators are injected at construction; nothing here is a
//! process-wide singleton, so tests build isolated engines per case.

use std::sync::Arc;
use std::time::{Duration, Instant};

use corpus_model::ScoredChunk;
use graph_store::{GraphStore, StoreStats};

use crate::cache::{QueryCache, QueryFingerprint};
use crate::coordinator::HybridSearcher;
use crate::embedder::Embedder;
use crate::stats::{EngineStats, StatsCollector};
use crate::ServiceError;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Weight of the vector side in score fusion.
    pub default_alpha: f32,
    /// Bounded FIFO cache capacity in entries.
    pub cache_capacity: usize,
    /// Deadline for the health probe's pooled round-trip.
    pub health_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_alpha: 0.5,
            cache_capacity: 100,
            health_timeout: Duration::from_millis(250),
        }
    }
}

/// Outcome of one `query` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub chunks: Vec<ScoredChunk>,
    pub elapsed: Duration,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Health {
    pub storage_reachable: bool,
    pub pool_available_sessions: usize,
}

pub struct RetrievalEngine {
    store: Arc<GraphStore>,
    searcher: HybridSearcher,
    cache: QueryCache,
    stats: StatsCollector,
    cfg: EngineConfig,
}

impl RetrievalEngine {
    pub fn new(store: Arc<GraphStore>, embedder: Arc<dyn Embedder>, cfg: EngineConfig) -> Self {
        let backend: Arc<dyn crate::coordinator::SearchBackend> = store.clone();
        Self {
            searcher: HybridSearcher::new(backend, embedder),
            cache: QueryCache::new(cfg.cache_capacity),
            stats: StatsCollector::new(),
            store,
            cfg,
        }
    }

    /// Cached hybrid query with the configured alpha.
    pub fn query(&self, text: &str, k: usize) -> Result<RetrievalResult, ServiceError> {
        self.query_with_alpha(text, k, self.cfg.default_alpha)
    }

    pub fn query_with_alpha(
        &self,
        text: &str,
        k: usize,
        alpha: f32,
    ) -> Result<RetrievalResult, ServiceError> {
        let start = Instant::now();
        let fingerprint = QueryFingerprint::compute(text, k, alpha);

        if let Some(chunks) = self.cache.get(&fingerprint) {
            let elapsed = start.elapsed();
            self.stats.record_hit(elapsed);
            tracing::debug!(k, alpha, elapsed_us = elapsed.as_micros() as u64, "cache hit");
            return Ok(RetrievalResult { chunks, elapsed, cache_hit: true });
        }

        match self.searcher.search(text, k, alpha) {
            Ok(chunks) => {
                self.cache.put(fingerprint, chunks.clone());
                let elapsed = start.elapsed();
                self.stats.record_miss(elapsed);
                tracing::debug!(
                    k,
                    alpha,
                    hits = chunks.len(),
                    elapsed_us = elapsed.as_micros() as u64,
                    "cache miss served"
                );
                Ok(RetrievalResult { chunks, elapsed, cache_hit: false })
            }
            Err(e) => {
                self.stats.record_failure();
                Err(e)
            }
        }
    }

    /// Freshness escape hatch: skip the cache entirely (no read, no write).
    /// The cache is not invalidated on ingest, so callers that must see new
    /// documents immediately use this path.
    pub fn query_uncached(
        &self,
        text: &str,
        k: usize,
        alpha: f32,
    ) -> Result<RetrievalResult, ServiceError> {
        let start = Instant::now();
        match self.searcher.search(text, k, alpha) {
            Ok(chunks) => {
                let elapsed = start.elapsed();
                self.stats.record_miss(elapsed);
                Ok(RetrievalResult { chunks, elapsed, cache_hit: false })
            }
            Err(e) => {
                self.stats.record_failure();
                Err(e)
            }
        }
    }

    /// Trivial pooled round-trip with a short deadline; never blocks
    /// indefinitely.
    pub fn health(&self) -> Health {
        let storage_reachable = self.store.ping_within(self.cfg.health_timeout).is_ok();
        Health {
            storage_reachable,
            pool_available_sessions: self.store.pool().available(),
        }
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.snapshot()
    }

    pub fn store_stats(&self) -> Result<StoreStats, ServiceError> {
        Ok(self.store.stats()?)
    }
}
