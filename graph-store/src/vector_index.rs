//! Resident HNSW vector index (cosine distance).
//!
//! The stored embeddings are the system of record; the index is rebuilt from
//! them when the store opens and updated in place on ingest. Deletes are
//! tombstones (HNSW has no true delete).

use std::collections::{HashMap, HashSet};

use corpus_model::ChunkId;
use hnsw_rs::prelude::*;

pub struct VectorIndex {
    dim: usize,
    hnsw: Hnsw<'static, f32, DistCosine>,
    /// Map chunk_id -> internal label
    id_map: HashMap<String, usize>,
    /// Reverse map internal label -> chunk_id
    rev_map: Vec<String>,
    tombstones: HashSet<usize>,
}

impl VectorIndex {
    pub fn new(dim: usize, expected: usize) -> Self {
        let max_nb_conn = 16;
        let ef_c = 200;
        let num_layers = 16;
        let hnsw = Hnsw::<f32, DistCosine>::new(
            max_nb_conn,
            expected.max(1_000),
            num_layers,
            ef_c,
            DistCosine {},
        );
        Self {
            dim,
            hnsw,
            id_map: HashMap::new(),
            rev_map: Vec::new(),
            tombstones: HashSet::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Number of live (non-tombstoned) vectors.
    pub fn len(&self) -> usize {
        self.rev_map.len() - self.tombstones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Upsert vectors; a repeated chunk_id reinserts under its old label.
    pub fn upsert(&mut self, items: &[(ChunkId, Vec<f32>)]) {
        for (cid, v) in items {
            if v.len() != self.dim {
                continue;
            }
            let label = if let Some(&lbl) = self.id_map.get(&cid.0) {
                self.tombstones.remove(&lbl);
                lbl
            } else {
                let lbl = self.rev_map.len();
                self.id_map.insert(cid.0.clone(), lbl);
                self.rev_map.push(cid.0.clone());
                lbl
            };
            self.hnsw.insert((&v[..], label));
        }
    }

    /// Tombstone the given chunk ids.
    pub fn remove(&mut self, ids: &[ChunkId]) {
        for cid in ids {
            if let Some(&lbl) = self.id_map.get(&cid.0) {
                self.tombstones.insert(lbl);
            }
        }
    }

    /// K nearest neighbours by cosine similarity, best first.
    ///
    /// Returns `(chunk_id, similarity)` with similarity = 1 - distance.
    /// `k` larger than the live corpus returns everything available.
    pub fn knn(&self, query: &[f32], k: usize) -> Vec<(ChunkId, f32)> {
        if query.len() != self.dim || k == 0 || self.is_empty() {
            return Vec::new();
        }
        // Over-ask so tombstones do not starve the result set.
        let ask = (k.saturating_mul(5)).min(self.rev_map.len()).max(1);
        let ef_s = (k.saturating_mul(10)).max(ask);
        let knn = self.hnsw.search(query, ask, ef_s);
        let mut out = Vec::with_capacity(k);
        for el in knn {
            let label = el.d_id;
            if self.tombstones.contains(&label) {
                continue;
            }
            let score = 1.0f32 - el.distance;
            out.push((ChunkId(self.rev_map[label].clone()), score));
            if out.len() >= k {
                break;
            }
        }
        out
    }
}
