pub mod keyword_index;
pub mod pool;
pub mod store;
pub mod vector_index;

pub use pool::{ConnectionPool, PoolConfig, PooledSession};
pub use store::{GraphStore, StoreConfig, StoreStats};

/// Error taxonomy for the storage layer and the connection pool.
///
/// Callers distinguish "try again" (`PoolExhausted`, `Session`) from
/// "something is broken" (`Backend`, `Integrity`). Nothing here is retried
/// internally.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No pooled session became free before the acquisition deadline.
    #[error("no session available within {waited_ms} ms")]
    PoolExhausted { waited_ms: u64 },
    /// A pooled session broke mid-use or could not be (re)opened.
    #[error("session error: {0}")]
    Session(String),
    /// The backend is unreachable or rejected a statement.
    #[error("backend error: {0}")]
    Backend(String),
    /// A data-model invariant would be violated by the requested write.
    #[error("integrity error: {0}")]
    Integrity(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}
