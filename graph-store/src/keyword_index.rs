//! FTS5-backed keyword search over the chunk nodes.
//!
//! Index maintenance is handled by SQLite triggers installed with the schema;
//! this module only builds queries and shapes results.

use corpus_model::ChunkId;
use rusqlite::Connection;

use crate::StoreError;

/// Turn free-form query text into an FTS5 MATCH expression.
///
/// Natural-language queries contain characters FTS5 treats as syntax, so each
/// alphanumeric token is quoted and tokens are OR-joined; bm25 still ranks
/// chunks matching more tokens higher.
pub(crate) fn match_expression(query: &str) -> Option<String> {
    let tokens: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.to_lowercase()))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" OR "))
    }
}

/// Lexical search returning `(chunk_id, relevance)` ordered best-first.
///
/// The relevance score is negated BM25 rank, so larger is better. The scale
/// is unbounded; callers fusing with other lists normalize first.
pub(crate) fn search_ids(
    conn: &Connection,
    query: &str,
    k: usize,
) -> Result<Vec<(ChunkId, f32)>, StoreError> {
    if k == 0 {
        return Ok(Vec::new());
    }
    let Some(expr) = match_expression(query) else {
        return Ok(Vec::new());
    };

    let mut stmt = conn.prepare(
        "SELECT c.id, bm25(chunks_fts) AS rank \n\
         FROM chunks_fts \n\
         JOIN chunks c ON c.rowid = chunks_fts.rowid \n\
         WHERE chunks_fts MATCH ?1 \n\
         ORDER BY rank LIMIT ?2",
    )?;
    let rows = stmt.query_map(rusqlite::params![expr, k as i64], |row| {
        let chunk_id: String = row.get(0)?;
        let rank: f64 = row.get(1)?; // smaller is better
        Ok((ChunkId(chunk_id), -(rank as f32)))
    })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}
