//! SQLite persistence for the ideation study.
//!
//! This crate provides:
//! - Connection pooling (r2d2-sqlite) with WAL and foreign-key pragmas
//! - Forward-only schema migrations tracked in `PRAGMA user_version`
//! - Transaction and `spawn_blocking` helpers
//! - [`SqliteStore`], the backend implementing every `study_core` store trait

pub mod async_wrapper;
pub mod connection;
pub mod migrations;
mod rows;
pub mod sqlite_store;
pub mod transactions;

pub use async_wrapper::with_connection;
pub use connection::{DbPool, initialize_pool};
pub use sqlite_store::SqliteStore;
pub use transactions::execute_in_transaction;

use study_core::StoreError;

/// Database module result type
pub type Result<T> = std::result::Result<T, DbError>;

/// Database error types
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Background task failed: {0}")]
    Join(String),

    #[error("Migration error: {0}")]
    Migration(String),

    /// Stored data that no longer decodes into a domain value
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Corrupt(message) => StoreError::Corrupt(message),
            other => StoreError::backend_with_source("sqlite store", other),
        }
    }
}
