//! Bounded pool of reusable sessions to the storage backend.
//!
//! Sessions are checked out with [`ConnectionPool::acquire`] and returned on
//! drop of the [`PooledSession`] guard, so restitution happens on every exit
//! path including panics. Broken sessions are detected lazily on acquire and
//! replaced rather than handed out.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use rusqlite::Connection;

use crate::StoreError;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of sessions opened at construction. Fixed for the pool's life.
    pub size: usize,
    /// How long `acquire` may block before failing with `PoolExhausted`.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { size: 10, acquire_timeout: Duration::from_secs(5) }
    }
}

/// A reusable connection handle to the backend.
pub struct Session {
    conn: Connection,
}

impl Session {
    fn open(path: &Path) -> Result<Self, StoreError> {
        let conn =
            Connection::open(path).map_err(|e| StoreError::Session(e.to_string()))?;
        conn.pragma_update(None, "journal_mode", &"WAL")
            .map_err(|e| StoreError::Session(e.to_string()))?;
        conn.pragma_update(None, "foreign_keys", &"ON")
            .map_err(|e| StoreError::Session(e.to_string()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| StoreError::Session(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Cheap liveness probe; a session failing this is discarded.
    fn is_healthy(&self) -> bool {
        self.conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0)).is_ok()
    }
}

pub struct ConnectionPool {
    path: PathBuf,
    cfg: PoolConfig,
    idle: Mutex<VecDeque<Session>>,
    available: Condvar,
}

impl ConnectionPool {
    /// Open a pool of `cfg.size` sessions against the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P, cfg: PoolConfig) -> Result<Self, StoreError> {
        let size = cfg.size.max(1);
        let path = path.as_ref().to_path_buf();
        let mut idle = VecDeque::with_capacity(size);
        for _ in 0..size {
            idle.push_back(Session::open(&path)?);
        }
        Ok(Self {
            path,
            cfg: PoolConfig { size, ..cfg },
            idle: Mutex::new(idle),
            available: Condvar::new(),
        })
    }

    /// Check out a session, blocking up to the configured acquire timeout.
    pub fn acquire(&self) -> Result<PooledSession<'_>, StoreError> {
        self.acquire_within(self.cfg.acquire_timeout)
    }

    /// Check out a session with an explicit deadline.
    pub fn acquire_within(&self, timeout: Duration) -> Result<PooledSession<'_>, StoreError> {
        let start = Instant::now();
        let deadline = start + timeout;
        let mut idle = self
            .idle
            .lock()
            .map_err(|_| StoreError::Session("pool lock poisoned".into()))?;
        loop {
            if let Some(session) = idle.pop_front() {
                drop(idle);
                let session = if session.is_healthy() {
                    session
                } else {
                    tracing::warn!("discarding broken pooled session");
                    match Session::open(&self.path) {
                        Ok(fresh) => fresh,
                        Err(e) => {
                            // Park the dead session back so the slot is not
                            // lost; the next acquire retries the replacement.
                            self.release(session);
                            return Err(e);
                        }
                    }
                };
                return Ok(PooledSession { pool: self, session: Some(session) });
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(StoreError::PoolExhausted {
                    waited_ms: timeout.as_millis() as u64,
                });
            }
            let (guard, wait) = self
                .available
                .wait_timeout(idle, deadline - now)
                .map_err(|_| StoreError::Session("pool lock poisoned".into()))?;
            idle = guard;
            if wait.timed_out() && idle.is_empty() {
                return Err(StoreError::PoolExhausted {
                    waited_ms: timeout.as_millis() as u64,
                });
            }
        }
    }

    /// Fixed pool size chosen at construction.
    pub fn size(&self) -> usize {
        self.cfg.size
    }

    /// Number of sessions currently checked in (free for acquisition).
    pub fn available(&self) -> usize {
        self.idle.lock().map(|q| q.len()).unwrap_or(0)
    }

    fn release(&self, session: Session) {
        if let Ok(mut idle) = self.idle.lock() {
            idle.push_back(session);
        }
        self.available.notify_one();
    }
}

/// RAII checkout of one pooled session.
pub struct PooledSession<'a> {
    pool: &'a ConnectionPool,
    session: Option<Session>,
}

impl std::fmt::Debug for PooledSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSession").finish_non_exhaustive()
    }
}

impl PooledSession<'_> {
    pub fn conn(&self) -> &Connection {
        // Invariant: the session is only taken in drop.
        &self.session.as_ref().expect("session present until drop").conn
    }

    /// Mutable access, needed for explicit transactions.
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.session.as_mut().expect("session present until drop").conn
    }
}

impl Drop for PooledSession<'_> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.release(session);
        }
    }
}
