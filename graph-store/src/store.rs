//! SQLite-backed graph store: document nodes, chunk nodes, containment edges.
//!
//! The keyword index (FTS5) lives in the database and is maintained by
//! triggers; the vector index is resident in memory and rebuilt from the
//! persisted embeddings when the store opens.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use corpus_model::{Chunk, ChunkId, ChunkInput, Document, DocumentId, DocumentMeta, ScoredChunk};
use rusqlite::{params, Connection, TransactionBehavior};

use crate::keyword_index;
use crate::pool::{ConnectionPool, PoolConfig};
use crate::vector_index::VectorIndex;
use crate::StoreError;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub pool: PoolConfig,
    /// Deployment-wide embedding dimensionality. Persisted in `store_meta`
    /// on first open; reopening with a different value is rejected.
    pub embedding_dim: usize,
}

impl StoreConfig {
    pub fn new(embedding_dim: usize) -> Self {
        Self { pool: PoolConfig::default(), embedding_dim }
    }
}

/// Read-only aggregate over the stored corpus, computed live.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreStats {
    pub document_count: u64,
    pub chunk_count: u64,
    pub avg_chunks_per_doc: f64,
}

pub struct GraphStore {
    pool: ConnectionPool,
    index: RwLock<VectorIndex>,
    dim: usize,
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore").field("dim", &self.dim).finish_non_exhaustive()
    }
}

impl GraphStore {
    /// Open (or create) the store at `path` and rebuild the vector index.
    pub fn open<P: AsRef<Path>>(path: P, cfg: StoreConfig) -> Result<Self, StoreError> {
        if let Some(dir) = path.as_ref().parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| StoreError::Backend(e.to_string()))?;
            }
        }
        let pool = ConnectionPool::open(&path, cfg.pool.clone())?;
        let store = Self {
            pool,
            index: RwLock::new(VectorIndex::new(cfg.embedding_dim, 10_000)),
            dim: cfg.embedding_dim,
        };
        store.init_schema()?;
        store.check_embedding_dim()?;
        store.rebuild_vector_index()?;
        Ok(store)
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn embedding_dim(&self) -> usize {
        self.dim
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let session = self.pool.acquire()?;
        session.conn().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                source TEXT NOT NULL,
                meta_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunks (
                rowid INTEGER PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL
            );

            -- Containment edges: document -> chunk, carrying the chunk's
            -- position. UNIQUE(chunk_id) enforces single ownership; the
            -- composite key enforces one chunk per position per document.
            CREATE TABLE IF NOT EXISTS contains (
                doc_id TEXT NOT NULL REFERENCES documents(id),
                chunk_id TEXT NOT NULL UNIQUE REFERENCES chunks(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                PRIMARY KEY (doc_id, position)
            );
            CREATE INDEX IF NOT EXISTS idx_contains_doc ON contains(doc_id);

            -- FTS5 virtual table linked to chunks via content= and rowid
            CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
                text,
                content='chunks',
                content_rowid='rowid',
                tokenize = 'unicode61'
            );

            -- Triggers to keep the FTS index consistent
            CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
                INSERT INTO chunks_fts(rowid, text) VALUES (new.rowid, new.text);
            END;

            CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
                INSERT INTO chunks_fts(chunks_fts, rowid, text) VALUES ('delete', old.rowid, old.text);
            END;

            CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE OF text ON chunks BEGIN
                INSERT INTO chunks_fts(chunks_fts, rowid, text) VALUES ('delete', old.rowid, old.text);
                INSERT INTO chunks_fts(rowid, text) VALUES (new.rowid, new.text);
            END;

            CREATE TABLE IF NOT EXISTS store_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn check_embedding_dim(&self) -> Result<(), StoreError> {
        let session = self.pool.acquire()?;
        let existing: Option<String> = session
            .conn()
            .query_row(
                "SELECT value FROM store_meta WHERE key = 'embedding_dim'",
                [],
                |r| r.get(0),
            )
            .ok();
        match existing {
            Some(v) => {
                let stored: usize = v
                    .parse()
                    .map_err(|_| StoreError::Backend(format!("bad embedding_dim meta: {v}")))?;
                if stored != self.dim {
                    return Err(StoreError::Integrity(format!(
                        "store was created with embedding_dim {stored}, opened with {}",
                        self.dim
                    )));
                }
            }
            None => {
                session.conn().execute(
                    "INSERT INTO store_meta (key, value) VALUES ('embedding_dim', ?1)",
                    [self.dim.to_string()],
                )?;
            }
        }
        Ok(())
    }

    fn rebuild_vector_index(&self) -> Result<(), StoreError> {
        let session = self.pool.acquire()?;
        let mut stmt = session.conn().prepare("SELECT id, embedding FROM chunks")?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((id, blob))
        })?;

        let mut items: Vec<(ChunkId, Vec<f32>)> = Vec::new();
        for r in rows {
            let (id, blob) = r?;
            if blob.len() != self.dim * 4 {
                return Err(StoreError::Integrity(format!(
                    "chunk '{id}' has embedding of {} bytes, expected {}",
                    blob.len(),
                    self.dim * 4
                )));
            }
            let vector: Vec<f32> = bytemuck::pod_collect_to_vec(&blob);
            items.push((ChunkId(id), vector));
        }
        drop(stmt);
        drop(session);

        if !items.is_empty() {
            tracing::info!(chunks = items.len(), "rebuilding vector index");
            let mut index = self.write_index()?;
            index.upsert(&items);
        }
        Ok(())
    }

    fn read_index(&self) -> Result<std::sync::RwLockReadGuard<'_, VectorIndex>, StoreError> {
        self.index
            .read()
            .map_err(|_| StoreError::Backend("vector index lock poisoned".into()))
    }

    fn write_index(&self) -> Result<std::sync::RwLockWriteGuard<'_, VectorIndex>, StoreError> {
        self.index
            .write()
            .map_err(|_| StoreError::Backend("vector index lock poisoned".into()))
    }

    /// Idempotent document upsert.
    ///
    /// Same id + identical content is a no-op. Same id + different content is
    /// rejected unless `force`, in which case the document is replaced and
    /// its previous chunks are cascade-deleted.
    pub fn upsert_document(&self, doc: &Document, force: bool) -> Result<(), StoreError> {
        let session = self.pool.acquire()?;
        let existing: Option<String> = session
            .conn()
            .query_row(
                "SELECT content FROM documents WHERE id = ?1",
                [doc.id.0.as_str()],
                |r| r.get(0),
            )
            .ok();

        let meta_json = serde_json::to_string(&doc.meta)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match existing {
            None => {
                session.conn().execute(
                    "INSERT INTO documents (id, content, source, meta_json, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![doc.id.0, doc.content, doc.source, meta_json, doc.created_at],
                )?;
                tracing::info!(doc_id = %doc.id, "document inserted");
                Ok(())
            }
            Some(content) if content == doc.content => {
                tracing::debug!(doc_id = %doc.id, "upsert is a no-op (identical content)");
                Ok(())
            }
            Some(_) if !force => Err(StoreError::Integrity(format!(
                "document '{}' already exists with different content; pass force to replace",
                doc.id
            ))),
            Some(_) => {
                let removed = self.delete_chunks_of(session.conn(), &doc.id)?;
                session.conn().execute(
                    "UPDATE documents SET content = ?2, source = ?3, meta_json = ?4, created_at = ?5 \
                     WHERE id = ?1",
                    params![doc.id.0, doc.content, doc.source, meta_json, doc.created_at],
                )?;
                tracing::info!(doc_id = %doc.id, chunks_removed = removed.len(), "document replaced");
                Ok(())
            }
        }
    }

    /// Batched chunk insert for one document. All-or-nothing.
    ///
    /// Fails with `Integrity` when the document does not exist, when an
    /// embedding has the wrong dimensionality, or when the batch's chunk
    /// indexes do not continue the document's sequence contiguously.
    pub fn add_chunks(
        &self,
        doc_id: &DocumentId,
        inputs: Vec<ChunkInput>,
    ) -> Result<(), StoreError> {
        if inputs.is_empty() {
            return Ok(());
        }
        for input in &inputs {
            if input.embedding.len() != self.dim {
                return Err(StoreError::Integrity(format!(
                    "chunk {} of '{doc_id}' has embedding dimension {}, expected {}",
                    input.chunk_index,
                    input.embedding.len(),
                    self.dim
                )));
            }
        }

        let mut inputs = inputs;
        inputs.sort_by_key(|c| c.chunk_index);

        let mut session = self.pool.acquire()?;
        let tx = session
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let doc_exists: bool = tx
            .query_row(
                "SELECT 1 FROM documents WHERE id = ?1",
                [doc_id.0.as_str()],
                |_| Ok(()),
            )
            .is_ok();
        if !doc_exists {
            return Err(StoreError::Integrity(format!(
                "cannot add chunks: document '{doc_id}' does not exist"
            )));
        }

        let existing: u32 = tx.query_row(
            "SELECT COUNT(*) FROM contains WHERE doc_id = ?1",
            [doc_id.0.as_str()],
            |r| r.get(0),
        )?;
        for (offset, input) in inputs.iter().enumerate() {
            let expected = existing + offset as u32;
            if input.chunk_index != expected {
                return Err(StoreError::Integrity(format!(
                    "chunk indexes for '{doc_id}' must be unique and contiguous: \
                     expected {expected}, got {}",
                    input.chunk_index
                )));
            }
        }

        let mut vectors: Vec<(ChunkId, Vec<f32>)> = Vec::with_capacity(inputs.len());
        {
            let mut insert_chunk = tx.prepare(
                "INSERT INTO chunks (id, text, embedding) VALUES (?1, ?2, ?3)",
            )?;
            let mut insert_edge = tx.prepare(
                "INSERT INTO contains (doc_id, chunk_id, position) VALUES (?1, ?2, ?3)",
            )?;
            for input in &inputs {
                let chunk_id = format!("{}#{}", doc_id, input.chunk_index);
                let blob: &[u8] = bytemuck::cast_slice(&input.embedding);
                insert_chunk.execute(params![chunk_id, input.text, blob])?;
                insert_edge.execute(params![doc_id.0, chunk_id, input.chunk_index as i64])?;
                vectors.push((ChunkId(chunk_id), input.embedding.clone()));
            }
        }
        tx.commit()?;
        drop(session);

        // Embeddings are committed; only now do the chunks become visible to
        // vector search.
        let mut index = self.write_index()?;
        index.upsert(&vectors);
        tracing::info!(doc_id = %doc_id, chunks = vectors.len(), "chunks ingested");
        Ok(())
    }

    /// Up to `k` chunks by descending cosine similarity. `k == 0` and an
    /// oversized `k` are tolerated, not errors.
    pub fn vector_search(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if query_embedding.len() != self.dim {
            return Err(StoreError::Integrity(format!(
                "query embedding has dimension {}, store expects {}",
                query_embedding.len(),
                self.dim
            )));
        }
        let matches = self.read_index()?.knn(query_embedding, k);
        if matches.is_empty() {
            return Ok(Vec::new());
        }
        let session = self.pool.acquire()?;
        Self::materialize(session.conn(), &matches)
    }

    /// Up to `k` chunks by descending lexical relevance (negated BM25).
    pub fn keyword_search(&self, query_text: &str, k: usize) -> Result<Vec<ScoredChunk>, StoreError> {
        if k == 0 || query_text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let session = self.pool.acquire()?;
        let matches = keyword_index::search_ids(session.conn(), query_text, k)?;
        if matches.is_empty() {
            return Ok(Vec::new());
        }
        Self::materialize(session.conn(), &matches)
    }

    /// Resolve scored ids to full chunks, preserving the given order.
    fn materialize(
        conn: &Connection,
        matches: &[(ChunkId, f32)],
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let mut placeholders = String::from("(");
        for i in 0..matches.len() {
            if i > 0 {
                placeholders.push(',');
            }
            placeholders.push('?');
        }
        placeholders.push(')');

        let sql = format!(
            "SELECT c.id, e.doc_id, e.position, c.text \
             FROM chunks c JOIN contains e ON e.chunk_id = c.id \
             WHERE c.id IN {placeholders}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let ids: Vec<&str> = matches.iter().map(|(c, _)| c.0.as_str()).collect();
        let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), |row| {
            let id: String = row.get(0)?;
            let doc_id: String = row.get(1)?;
            let position: i64 = row.get(2)?;
            let text: String = row.get(3)?;
            Ok(Chunk {
                id: ChunkId(id),
                doc_id: DocumentId(doc_id),
                chunk_index: position as u32,
                text,
            })
        })?;

        let mut by_id: HashMap<String, Chunk> = HashMap::with_capacity(matches.len());
        for r in rows {
            let chunk = r?;
            by_id.insert(chunk.id.0.clone(), chunk);
        }

        let mut out = Vec::with_capacity(matches.len());
        for (cid, score) in matches {
            if let Some(chunk) = by_id.remove(&cid.0) {
                out.push(ScoredChunk { chunk, score: *score });
            }
        }
        Ok(out)
    }

    /// Fetch one document, or `None` when absent.
    pub fn get_document(&self, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        let session = self.pool.acquire()?;
        let mut stmt = session.conn().prepare(
            "SELECT id, content, source, meta_json, created_at FROM documents WHERE id = ?1",
        )?;
        let mut rows = stmt.query([id.0.as_str()])?;
        if let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let content: String = row.get(1)?;
            let source: String = row.get(2)?;
            let meta_json: String = row.get(3)?;
            let created_at: String = row.get(4)?;
            let meta: DocumentMeta = serde_json::from_str(&meta_json).unwrap_or_default();
            Ok(Some(Document {
                id: DocumentId(id),
                content,
                source,
                meta,
                created_at,
            }))
        } else {
            Ok(None)
        }
    }

    /// List document ids with pagination, newest first.
    pub fn list_documents(&self, limit: usize, offset: usize) -> Result<Vec<DocumentId>, StoreError> {
        let session = self.pool.acquire()?;
        let mut stmt = session.conn().prepare(
            "SELECT id FROM documents ORDER BY created_at DESC, id LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], |row| {
            let id: String = row.get(0)?;
            Ok(DocumentId(id))
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// All chunks of a document ordered by `chunk_index`.
    pub fn get_chunks(&self, doc_id: &DocumentId) -> Result<Vec<Chunk>, StoreError> {
        let session = self.pool.acquire()?;
        let mut stmt = session.conn().prepare(
            "SELECT c.id, e.doc_id, e.position, c.text \
             FROM chunks c JOIN contains e ON e.chunk_id = c.id \
             WHERE e.doc_id = ?1 ORDER BY e.position",
        )?;
        let rows = stmt.query_map([doc_id.0.as_str()], |row| {
            let id: String = row.get(0)?;
            let doc_id: String = row.get(1)?;
            let position: i64 = row.get(2)?;
            let text: String = row.get(3)?;
            Ok(Chunk {
                id: ChunkId(id),
                doc_id: DocumentId(doc_id),
                chunk_index: position as u32,
                text,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Administrative delete; cascades to the document's chunks and edges.
    /// Returns true when the document existed.
    pub fn delete_document(&self, id: &DocumentId) -> Result<bool, StoreError> {
        let session = self.pool.acquire()?;
        let removed = self.delete_chunks_of(session.conn(), id)?;
        let n = session
            .conn()
            .execute("DELETE FROM documents WHERE id = ?1", [id.0.as_str()])?;
        if n > 0 {
            tracing::info!(doc_id = %id, chunks_removed = removed.len(), "document deleted");
        }
        Ok(n > 0)
    }

    /// Delete a document's chunk nodes (edges cascade) and tombstone the
    /// vector index. Returns the removed chunk ids.
    fn delete_chunks_of(
        &self,
        conn: &Connection,
        doc_id: &DocumentId,
    ) -> Result<Vec<ChunkId>, StoreError> {
        let mut stmt =
            conn.prepare("SELECT chunk_id FROM contains WHERE doc_id = ?1")?;
        let rows = stmt.query_map([doc_id.0.as_str()], |row| {
            let id: String = row.get(0)?;
            Ok(ChunkId(id))
        })?;
        let mut ids = Vec::new();
        for r in rows {
            ids.push(r?);
        }
        drop(stmt);
        if ids.is_empty() {
            return Ok(ids);
        }
        conn.execute(
            "DELETE FROM chunks WHERE id IN (SELECT chunk_id FROM contains WHERE doc_id = ?1)",
            [doc_id.0.as_str()],
        )?;
        self.write_index()?.remove(&ids);
        Ok(ids)
    }

    /// Chunks with no containment edge. Always zero unless an invariant has
    /// been violated; exposed for sweep checks.
    pub fn count_orphan_chunks(&self) -> Result<u64, StoreError> {
        let session = self.pool.acquire()?;
        let n: i64 = session.conn().query_row(
            "SELECT COUNT(*) FROM chunks c \
             LEFT JOIN contains e ON e.chunk_id = c.id \
             WHERE e.chunk_id IS NULL",
            [],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }

    /// Live corpus aggregates.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let session = self.pool.acquire()?;
        let document_count: i64 =
            session
                .conn()
                .query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?;
        let chunk_count: i64 =
            session
                .conn()
                .query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get(0))?;
        let avg = if document_count > 0 {
            chunk_count as f64 / document_count as f64
        } else {
            0.0
        };
        Ok(StoreStats {
            document_count: document_count as u64,
            chunk_count: chunk_count as u64,
            avg_chunks_per_doc: avg,
        })
    }

    /// Trivial pooled round-trip with a short deadline; used by health probes.
    pub fn ping_within(&self, timeout: Duration) -> Result<(), StoreError> {
        let session = self.pool.acquire_within(timeout)?;
        session
            .conn()
            .query_row("SELECT 1", [], |r| r.get::<_, i64>(0))?;
        Ok(())
    }
}
