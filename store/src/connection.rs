//! Connection pooling and pragma configuration

use std::path::Path;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use super::Result;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Milliseconds a writer waits on a locked database before failing.
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Open a pool on `db_path`, creating the file and its parent directory.
///
/// Every pooled connection gets WAL journaling, foreign keys and a busy
/// timeout.
pub fn initialize_pool(db_path: &Path, pool_size: u32) -> Result<DbPool> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path).with_init(apply_pragmas);
    let pool = Pool::builder()
        .max_size(pool_size)
        .connection_timeout(Duration::from_secs(10))
        .build(manager)?;

    tracing::debug!(path = %db_path.display(), pool_size, "sqlite pool initialized");
    Ok(pool)
}

/// Single-connection pool over a private in-memory database.
///
/// One connection only: every `:memory:` connection is its own database.
pub fn initialize_memory_pool() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory().with_init(apply_pragmas);
    Ok(Pool::builder().max_size(1).build(manager)?)
}

fn apply_pragmas(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pool_applies_pragmas() {
        let temp_dir = TempDir::new().unwrap();
        let pool = initialize_pool(&temp_dir.path().join("nested/study.db"), 4).unwrap();
        assert_eq!(pool.max_size(), 4);

        let conn = pool.get().unwrap();
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode, "wal");

        let foreign_keys: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);

        let busy_timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(busy_timeout, 5000);
    }
}
