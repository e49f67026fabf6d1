use std::sync::Arc;
use std::time::Duration;

use graph_store::pool::{ConnectionPool, PoolConfig};
use graph_store::StoreError;
use tempfile::TempDir;

fn open_pool(dir: &TempDir, size: usize, acquire_timeout: Duration) -> ConnectionPool {
    ConnectionPool::open(
        dir.path().join("pool.db"),
        PoolConfig { size, acquire_timeout },
    )
    .expect("open pool")
}

#[test]
fn release_on_drop_restores_availability() {
    let dir = TempDir::new().unwrap();
    let pool = open_pool(&dir, 3, Duration::from_secs(1));
    assert_eq!(pool.size(), 3);
    assert_eq!(pool.available(), 3);

    let a = pool.acquire().unwrap();
    let b = pool.acquire().unwrap();
    assert_eq!(pool.available(), 1);

    drop(a);
    assert_eq!(pool.available(), 2);
    drop(b);
    assert_eq!(pool.available(), 3);
}

#[test]
fn exhausted_pool_fails_after_the_deadline() {
    let dir = TempDir::new().unwrap();
    let pool = open_pool(&dir, 1, Duration::from_secs(5));
    let _held = pool.acquire().unwrap();

    let err = pool.acquire_within(Duration::from_millis(50)).unwrap_err();
    assert!(matches!(err, StoreError::PoolExhausted { .. }));
}

#[test]
fn blocked_acquire_succeeds_once_a_session_returns() {
    let dir = TempDir::new().unwrap();
    let pool = Arc::new(open_pool(&dir, 1, Duration::from_secs(5)));

    let held = pool.acquire().unwrap();
    let waiter = {
        let pool = Arc::clone(&pool);
        std::thread::spawn(move || {
            pool.acquire_within(Duration::from_secs(2)).map(|_| ())
        })
    };

    std::thread::sleep(Duration::from_millis(100));
    drop(held);

    waiter.join().unwrap().unwrap();
    assert_eq!(pool.available(), 1);
}

#[test]
fn more_workers_than_sessions_all_complete() {
    let dir = TempDir::new().unwrap();
    let pool = Arc::new(open_pool(&dir, 2, Duration::from_secs(5)));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                let session = pool.acquire()?;
                let one: i64 = session
                    .conn()
                    .query_row("SELECT 1", [], |r| r.get(0))
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
                std::thread::sleep(Duration::from_millis(10));
                Ok::<i64, StoreError>(one)
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), 1);
    }
    assert_eq!(pool.available(), 2);
}
