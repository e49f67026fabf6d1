//! Bounded query-result cache with strict FIFO eviction.
//!
//! FIFO (not LRU) is deliberate: eviction order equals insertion order no
//! matter how often an entry is read, which keeps behavior predictable and
//! the critical section trivial. Entries never expire by time and are not
//! invalidated on ingest; callers needing freshness bypass the cache.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use corpus_model::ScoredChunk;
use sha2::{Digest, Sha256};

/// Fixed query normalization: trim, lowercase, collapse whitespace runs.
/// Pinned so cache hit rates are predictable and testable.
pub fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .map(|t| t.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministic key over `(normalized_query, k, alpha)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryFingerprint([u8; 32]);

impl QueryFingerprint {
    pub fn compute(query_text: &str, k: usize, alpha: f32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize_query(query_text).as_bytes());
        hasher.update([0u8]);
        hasher.update((k as u64).to_le_bytes());
        hasher.update(alpha.to_bits().to_le_bytes());
        Self(hasher.finalize().into())
    }
}

struct CacheInner {
    map: HashMap<QueryFingerprint, Vec<ScoredChunk>>,
    order: VecDeque<QueryFingerprint>,
}

pub struct QueryCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner {
                map: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|g| g.map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, fingerprint: &QueryFingerprint) -> Option<Vec<ScoredChunk>> {
        let guard = self.inner.lock().ok()?;
        guard.map.get(fingerprint).cloned()
    }

    /// Insert a result set. Re-inserting an existing key replaces the value
    /// without refreshing its position in the eviction queue.
    pub fn put(&self, fingerprint: QueryFingerprint, result: Vec<ScoredChunk>) {
        if self.capacity == 0 {
            return;
        }
        let Ok(mut guard) = self.inner.lock() else {
            return;
        };
        if guard.map.insert(fingerprint, result).is_none() {
            guard.order.push_back(fingerprint);
            if guard.order.len() > self.capacity {
                if let Some(oldest) = guard.order.pop_front() {
                    guard.map.remove(&oldest);
                }
            }
        }
    }
}
