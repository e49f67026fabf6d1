use corpus_model::{ChunkInput, Document, DocumentId, DocumentMeta};
use graph_store::{GraphStore, StoreConfig, StoreError};
use tempfile::TempDir;

const DIM: usize = 4;

fn open_store(dir: &TempDir) -> GraphStore {
    GraphStore::open(dir.path().join("corpus.db"), StoreConfig::new(DIM))
        .expect("open store")
}

fn doc(id: &str, content: &str) -> Document {
    Document::new(
        id,
        content,
        format!("file:///{id}.txt"),
        DocumentMeta::default(),
        "2024-05-01T00:00:00Z",
    )
}

/// Unit vector along one of the 4 axes, so cosine ordering is predictable.
fn axis(i: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[i % DIM] = 1.0;
    v
}

#[test]
fn upsert_same_document_twice_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let d = doc("a", "alpha body");
    store.upsert_document(&d, false).unwrap();
    store.upsert_document(&d, false).unwrap();
    assert_eq!(store.stats().unwrap().document_count, 1);
}

#[test]
fn upsert_with_changed_content_requires_force() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.upsert_document(&doc("a", "original"), false).unwrap();
    store
        .add_chunks(
            &DocumentId("a".into()),
            vec![ChunkInput::new("original", axis(0), 0)],
        )
        .unwrap();

    let err = store
        .upsert_document(&doc("a", "rewritten"), false)
        .unwrap_err();
    assert!(matches!(err, StoreError::Integrity(_)));

    store.upsert_document(&doc("a", "rewritten"), true).unwrap();
    assert_eq!(store.stats().unwrap().document_count, 1);
    // Replacement cascades to the previous chunks.
    assert_eq!(store.get_chunks(&DocumentId("a".into())).unwrap().len(), 0);
    assert_eq!(store.count_orphan_chunks().unwrap(), 0);
}

#[test]
fn add_chunks_to_missing_document_fails_atomically() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let err = store
        .add_chunks(
            &DocumentId("ghost".into()),
            vec![ChunkInput::new("text", axis(0), 0)],
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::Integrity(_)));
    assert_eq!(store.stats().unwrap().chunk_count, 0);
}

#[test]
fn add_chunks_rejects_wrong_embedding_dimension() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.upsert_document(&doc("a", "body"), false).unwrap();
    let err = store
        .add_chunks(
            &DocumentId("a".into()),
            vec![ChunkInput::new("text", vec![1.0, 0.0], 0)],
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::Integrity(_)));
}

#[test]
fn add_chunks_rejects_non_contiguous_indexes() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.upsert_document(&doc("a", "body"), false).unwrap();
    let err = store
        .add_chunks(
            &DocumentId("a".into()),
            vec![
                ChunkInput::new("zero", axis(0), 0),
                ChunkInput::new("two", axis(1), 2),
            ],
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::Integrity(_)));
    // Nothing from the batch landed.
    assert_eq!(store.stats().unwrap().chunk_count, 0);
}

#[test]
fn chunk_ordering_is_reconstructible() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.upsert_document(&doc("a", "body"), false).unwrap();
    store
        .add_chunks(
            &DocumentId("a".into()),
            vec![
                ChunkInput::new("second", axis(1), 1),
                ChunkInput::new("first", axis(0), 0),
                ChunkInput::new("third", axis(2), 2),
            ],
        )
        .unwrap();
    let chunks = store.get_chunks(&DocumentId("a".into())).unwrap();
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
    let indexes: Vec<u32> = chunks.iter().map(|c| c.chunk_index).collect();
    assert_eq!(indexes, vec![0, 1, 2]);
}

#[test]
fn vector_search_orders_by_similarity_and_tolerates_large_k() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.upsert_document(&doc("a", "body"), false).unwrap();
    store
        .add_chunks(
            &DocumentId("a".into()),
            vec![
                ChunkInput::new("x axis", vec![1.0, 0.0, 0.0, 0.0], 0),
                ChunkInput::new("y axis", vec![0.0, 1.0, 0.0, 0.0], 1),
                ChunkInput::new("xy diagonal", vec![0.7, 0.7, 0.0, 0.0], 2),
            ],
        )
        .unwrap();

    let hits = store.vector_search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk.text, "x axis");
    assert_eq!(hits[1].chunk.text, "xy diagonal");
    assert!(hits[0].score >= hits[1].score);

    // k beyond the corpus returns everything, not an error.
    let all = store.vector_search(&[1.0, 0.0, 0.0, 0.0], 50).unwrap();
    assert_eq!(all.len(), 3);

    // k == 0 is an empty result, not an error.
    assert!(store.vector_search(&[1.0, 0.0, 0.0, 0.0], 0).unwrap().is_empty());
}

#[test]
fn keyword_search_finds_literal_phrases() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.upsert_document(&doc("a", "body"), false).unwrap();
    store
        .add_chunks(
            &DocumentId("a".into()),
            vec![
                ChunkInput::new("the quick brown fox", axis(0), 0),
                ChunkInput::new("a graph database stores edges", axis(1), 1),
                ChunkInput::new("vectors approximate meaning", axis(2), 2),
            ],
        )
        .unwrap();

    let hits = store.keyword_search("graph database", 3).unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].chunk.chunk_index, 1);

    assert!(store.keyword_search("   ", 3).unwrap().is_empty());
    assert!(store.keyword_search("graph", 0).unwrap().is_empty());
}

#[test]
fn delete_document_cascades_and_leaves_no_orphans() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.upsert_document(&doc("a", "body"), false).unwrap();
    store
        .add_chunks(
            &DocumentId("a".into()),
            vec![
                ChunkInput::new("one", axis(0), 0),
                ChunkInput::new("two", axis(1), 1),
            ],
        )
        .unwrap();

    assert!(store.delete_document(&DocumentId("a".into())).unwrap());
    assert!(!store.delete_document(&DocumentId("a".into())).unwrap());

    let stats = store.stats().unwrap();
    assert_eq!(stats.document_count, 0);
    assert_eq!(stats.chunk_count, 0);
    assert_eq!(store.count_orphan_chunks().unwrap(), 0);

    // Deleted chunks are gone from both search paths.
    assert!(store.keyword_search("one", 5).unwrap().is_empty());
    assert!(store.vector_search(&axis(0), 5).unwrap().is_empty());
}

#[test]
fn stats_reports_live_counts() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    for (i, id) in ["a", "b"].iter().enumerate() {
        store.upsert_document(&doc(id, "body"), false).unwrap();
        store
            .add_chunks(
                &DocumentId(id.to_string()),
                vec![
                    ChunkInput::new("one", axis(i), 0),
                    ChunkInput::new("two", axis(i + 1), 1),
                ],
            )
            .unwrap();
    }
    let stats = store.stats().unwrap();
    assert_eq!(stats.document_count, 2);
    assert_eq!(stats.chunk_count, 4);
    assert!((stats.avg_chunks_per_doc - 2.0).abs() < 1e-9);
}

#[test]
fn vector_index_is_rebuilt_on_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open_store(&dir);
        store.upsert_document(&doc("a", "body"), false).unwrap();
        store
            .add_chunks(
                &DocumentId("a".into()),
                vec![ChunkInput::new("persisted chunk", axis(0), 0)],
            )
            .unwrap();
    }
    let reopened = open_store(&dir);
    let hits = reopened.vector_search(&axis(0), 1).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.text, "persisted chunk");
}

#[test]
fn reopening_with_different_dimension_is_rejected() {
    let dir = TempDir::new().unwrap();
    {
        let _ = open_store(&dir);
    }
    let err = GraphStore::open(dir.path().join("corpus.db"), StoreConfig::new(DIM + 1))
        .unwrap_err();
    assert!(matches!(err, StoreError::Integrity(_)));
}
