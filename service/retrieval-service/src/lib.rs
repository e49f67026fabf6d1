//! Hybrid retrieval service: search coordination, query caching, and the
//! engine facade consumed by the answer-generation collaborator.

pub mod cache;
pub mod coordinator;
pub mod embedder;
pub mod engine;
pub mod fusion;
pub mod stats;

pub use cache::{QueryCache, QueryFingerprint};
pub use coordinator::{HybridSearcher, SearchBackend};
pub use embedder::{Embedder, EmbedderError};
pub use engine::{EngineConfig, Health, RetrievalEngine, RetrievalResult};
pub use stats::{EngineStats, StatsCollector};

use graph_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The embedding collaborator failed; the enclosing query fails rather
    /// than guessing a vector.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),
    /// Both hybrid sub-searches failed. A single failure degrades instead.
    #[error("search unavailable (vector: {vector}; keyword: {keyword})")]
    SearchUnavailable { vector: String, keyword: String },
}
