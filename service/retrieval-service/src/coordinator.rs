//! Hybrid search coordinator: runs the vector and keyword paths concurrently
//! and fuses the results.

use std::sync::Arc;

use corpus_model::ScoredChunk;
use graph_store::{GraphStore, StoreError};

use crate::embedder::Embedder;
use crate::fusion;
use crate::ServiceError;

/// How many candidates each sub-search fetches relative to `k`, so the
/// fusion step has room to re-rank without starving either path.
const OVERFETCH_FACTOR: usize = 2;

/// Storage seam for the two sub-searches. Implemented by [`GraphStore`];
/// tests substitute backends that fail one side.
pub trait SearchBackend: Send + Sync {
    fn vector_search(&self, query_embedding: &[f32], k: usize)
        -> Result<Vec<ScoredChunk>, StoreError>;
    fn keyword_search(&self, query_text: &str, k: usize)
        -> Result<Vec<ScoredChunk>, StoreError>;
}

impl SearchBackend for GraphStore {
    fn vector_search(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        GraphStore::vector_search(self, query_embedding, k)
    }

    fn keyword_search(&self, query_text: &str, k: usize) -> Result<Vec<ScoredChunk>, StoreError> {
        GraphStore::keyword_search(self, query_text, k)
    }
}

pub struct HybridSearcher {
    backend: Arc<dyn SearchBackend>,
    embedder: Arc<dyn Embedder>,
}

impl HybridSearcher {
    pub fn new(backend: Arc<dyn SearchBackend>, embedder: Arc<dyn Embedder>) -> Self {
        Self { backend, embedder }
    }

    /// Hybrid search with weighted fusion; `alpha` weights the vector side.
    ///
    /// The two sub-searches run concurrently, each acquiring its own pooled
    /// session inside the backend. One failing side degrades to the
    /// survivor's results; both failing is `SearchUnavailable`.
    pub fn search(
        &self,
        query_text: &str,
        k: usize,
        alpha: f32,
    ) -> Result<Vec<ScoredChunk>, ServiceError> {
        if k == 0 || query_text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(query_text)
            .map_err(|e| ServiceError::EmbeddingUnavailable(e.to_string()))?;

        let fetch = k.saturating_mul(OVERFETCH_FACTOR);
        let (vector_res, keyword_res) = std::thread::scope(|scope| {
            let vector = scope.spawn(|| self.backend.vector_search(&query_embedding, fetch));
            let keyword = scope.spawn(|| self.backend.keyword_search(query_text, fetch));
            (join_search(vector), join_search(keyword))
        });

        let (vector_hits, keyword_hits) = match (vector_res, keyword_res) {
            (Err(v), Err(kw)) => {
                return Err(ServiceError::SearchUnavailable {
                    vector: v.to_string(),
                    keyword: kw.to_string(),
                })
            }
            (Ok(v), Err(kw)) => {
                tracing::warn!(error = %kw, "keyword search failed, serving vector-only results");
                (v, Vec::new())
            }
            (Err(v), Ok(kw)) => {
                tracing::warn!(error = %v, "vector search failed, serving keyword-only results");
                (Vec::new(), kw)
            }
            (Ok(v), Ok(kw)) => (v, kw),
        };

        tracing::debug!(
            vector_hits = vector_hits.len(),
            keyword_hits = keyword_hits.len(),
            k,
            alpha,
            "fusing search results"
        );
        Ok(fusion::fuse(vector_hits, keyword_hits, alpha, k))
    }
}

fn join_search(
    handle: std::thread::ScopedJoinHandle<'_, Result<Vec<ScoredChunk>, StoreError>>,
) -> Result<Vec<ScoredChunk>, StoreError> {
    match handle.join() {
        Ok(res) => res,
        Err(_) => Err(StoreError::Backend("search worker panicked".into())),
    }
}
