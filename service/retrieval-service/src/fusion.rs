//! Score fusion for the two search paths.
//!
//! Each ranked list is min-max normalized to [0,1] within itself, then
//! combined as `alpha * vector + (1 - alpha) * keyword`. A chunk present in
//! only one list keeps 0 for the missing side but is never dropped: a pure
//! keyword match can still outrank a weak vector match.

use std::collections::HashMap;

use corpus_model::ScoredChunk;

/// Min-max normalize in place. A degenerate list (all scores equal, length-1
/// included) maps to 1.0 so a lone strong match is not zeroed out.
fn min_max_normalize(hits: &mut [ScoredChunk]) {
    if hits.is_empty() {
        return;
    }
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for h in hits.iter() {
        min = min.min(h.score);
        max = max.max(h.score);
    }
    let span = max - min;
    for h in hits.iter_mut() {
        h.score = if span > 0.0 { (h.score - min) / span } else { 1.0 };
    }
}

/// Fuse the two normalized lists and keep the top `k` with a deterministic
/// order: fused score descending, then `chunk_index` ascending, then
/// `doc_id` lexicographic.
pub fn fuse(
    mut vector: Vec<ScoredChunk>,
    mut keyword: Vec<ScoredChunk>,
    alpha: f32,
    k: usize,
) -> Vec<ScoredChunk> {
    if k == 0 {
        return Vec::new();
    }
    min_max_normalize(&mut vector);
    min_max_normalize(&mut keyword);

    let mut fused: HashMap<String, ScoredChunk> = HashMap::new();
    for mut hit in vector {
        hit.score *= alpha;
        fused.insert(hit.chunk.id.0.clone(), hit);
    }
    for mut hit in keyword {
        hit.score *= 1.0 - alpha;
        fused
            .entry(hit.chunk.id.0.clone())
            .and_modify(|existing| existing.score += hit.score)
            .or_insert(hit);
    }

    let mut out: Vec<ScoredChunk> = fused.into_values().collect();
    out.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
            .then_with(|| a.chunk.doc_id.cmp(&b.chunk.doc_id))
    });
    out.truncate(k);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_model::{Chunk, ChunkId, DocumentId};

    fn hit(doc: &str, index: u32, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: ChunkId(format!("{doc}#{index}")),
                doc_id: DocumentId(doc.to_string()),
                chunk_index: index,
                text: String::new(),
            },
            score,
        }
    }

    #[test]
    fn missing_side_contributes_zero_but_survives() {
        let vector = vec![hit("d", 0, 0.9), hit("d", 1, 0.1)];
        let keyword = vec![hit("d", 2, 5.0)];
        let out = fuse(vector, keyword, 0.5, 10);
        assert_eq!(out.len(), 3);
        // Keyword-only chunk normalizes to 1.0 on its side: fused 0.5.
        let kw_only = out.iter().find(|h| h.chunk.chunk_index == 2).unwrap();
        assert!((kw_only.score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn pure_keyword_match_outranks_weak_vector_match() {
        let vector = vec![hit("d", 0, 0.8), hit("d", 1, 0.2)];
        let keyword = vec![hit("d", 2, 3.0)];
        let out = fuse(vector, keyword, 0.5, 10);
        // Weakest vector hit normalizes to 0.0; keyword-only fuses to 0.5.
        assert_eq!(out[0].chunk.chunk_index, 0);
        assert_eq!(out[1].chunk.chunk_index, 2);
        assert_eq!(out[2].chunk.chunk_index, 1);
    }

    #[test]
    fn ties_break_by_chunk_index_then_doc_id() {
        let vector = vec![hit("b", 3, 1.0), hit("a", 3, 1.0), hit("a", 1, 1.0)];
        let out = fuse(vector, Vec::new(), 1.0, 10);
        let order: Vec<(u32, String)> = out
            .iter()
            .map(|h| (h.chunk.chunk_index, h.chunk.doc_id.0.clone()))
            .collect();
        assert_eq!(
            order,
            vec![(1, "a".into()), (3, "a".into()), (3, "b".into())]
        );
    }

    #[test]
    fn degenerate_list_normalizes_to_one() {
        let keyword = vec![hit("d", 0, 42.0)];
        let out = fuse(Vec::new(), keyword, 0.5, 10);
        assert!((out[0].score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn truncates_to_k_and_handles_zero_k() {
        let vector = vec![hit("d", 0, 0.9), hit("d", 1, 0.5), hit("d", 2, 0.1)];
        assert_eq!(fuse(vector.clone(), Vec::new(), 1.0, 2).len(), 2);
        assert!(fuse(vector, Vec::new(), 1.0, 0).is_empty());
    }
}
