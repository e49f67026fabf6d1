//! Shared models used across the retrieval crates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Stable identifier for an ingested document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

/// Stable identifier for a chunk within the corpus.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkId(pub String);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Document metadata: a small closed set of well-known keys plus an open
/// `extra` map so ingestion stays flexible without giving up typing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_method: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, JsonValue>,
}

/// A unit of ingested content. Written once by the ingestion collaborator,
/// never mutated by the retrieval core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    /// Full original text. May be large; search paths never load it.
    pub content: String,
    /// Origin path or URI.
    pub source: String,
    pub meta: DocumentMeta,
    /// RFC 3339 timestamp set at ingestion time.
    pub created_at: String,
}

/// Ingestion-side input for one chunk. The embedding is mandatory here by
/// construction: a chunk can never reach the store without it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkInput {
    pub text: String,
    pub embedding: Vec<f32>,
    /// Position of the chunk within its parent document.
    pub chunk_index: u32,
}

/// The unit of retrieval: a contiguous slice of a document's text.
///
/// The embedding is intentionally absent; search paths only need the text,
/// ordering, and ownership edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: DocumentId,
    pub chunk_index: u32,
    pub text: String,
}

/// A chunk paired with a relevance score (similarity, lexical, or fused).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
        meta: DocumentMeta,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            id: DocumentId(id.into()),
            content: content.into(),
            source: source.into(),
            meta,
            created_at: created_at.into(),
        }
    }
}

impl ChunkInput {
    pub fn new(text: impl Into<String>, embedding: Vec<f32>, chunk_index: u32) -> Self {
        Self { text: text.into(), embedding, chunk_index }
    }
}
