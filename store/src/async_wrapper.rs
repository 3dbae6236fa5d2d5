//! Bridge between the synchronous SQLite pool and the tokio runtime.
//!
//! Every store call runs its SQLite work on the blocking thread pool through
//! [`with_connection`], so request handlers never block a runtime worker.

use rusqlite::Connection;

use super::connection::DbPool;
use super::{DbError, Result};

/// Run `f` with a pooled connection on a blocking thread.
///
/// ```rust,no_run
/// # use study_store::{initialize_pool, with_connection};
/// # async fn example() -> study_store::Result<()> {
/// let pool = initialize_pool(std::path::Path::new("study.db"), 4)?;
/// let count: i64 = with_connection(&pool, |conn| {
///     Ok(conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?)
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_connection<F, T>(pool: &DbPool, f: F) -> Result<T>
where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();

    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await
    .map_err(|e| DbError::Join(format!("blocking task failed: {e}")))?
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::connection::initialize_pool;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_with_connection_basic() {
        let temp_dir = TempDir::new().unwrap();
        let pool = initialize_pool(&temp_dir.path().join("test.db"), 2).unwrap();

        with_connection(&pool, |conn| {
            conn.execute("CREATE TABLE t (value INTEGER)", [])?;
            conn.execute("INSERT INTO t (value) VALUES (42)", [])?;
            Ok(())
        })
        .await
        .unwrap();

        let value: i64 = with_connection(&pool, |conn| {
            Ok(conn.query_row("SELECT value FROM t", [], |row| row.get(0))?)
        })
        .await
        .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_with_connection_error_propagation() {
        let temp_dir = TempDir::new().unwrap();
        let pool = initialize_pool(&temp_dir.path().join("test.db"), 2).unwrap();

        let result: Result<i64> = with_connection(&pool, |conn| {
            Ok(conn.query_row("SELECT value FROM missing", [], |row| row.get(0))?)
        })
        .await;
        assert!(matches!(result, Err(DbError::Sqlite(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_operations() {
        let temp_dir = TempDir::new().unwrap();
        let pool = Arc::new(initialize_pool(&temp_dir.path().join("test.db"), 4).unwrap());
        with_connection(&pool, |conn| {
            conn.execute("CREATE TABLE t (value INTEGER)", [])?;
            Ok(())
        })
        .await
        .unwrap();

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move {
                    with_connection(&pool, move |conn| {
                        conn.execute("INSERT INTO t (value) VALUES (?1)", [i])?;
                        Ok(())
                    })
                    .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let count: i64 = with_connection(&pool, |conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))?)
        })
        .await
        .unwrap();
        assert_eq!(count, 10);
    }
}
