//! Schema versioning and migrations
//!
//! Forward-only. Each step runs in its own transaction and bumps
//! `PRAGMA user_version` on commit.

use rusqlite::{Connection, TransactionBehavior};

use super::transactions::execute_in_transaction;
use super::{DbError, Result};

const MIGRATIONS: &[&str] = &[include_str!("../schema/001_initial.sql")];

/// Current schema version
pub const SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

/// Apply all pending migrations.
pub fn migrate_to_latest(conn: &mut Connection) -> Result<()> {
    let current = schema_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(DbError::Migration(format!(
            "database schema version {current} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    for (index, sql) in MIGRATIONS.iter().enumerate().skip(current as usize) {
        let version = index as i32 + 1;
        execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
            tx.execute_batch(sql)?;
            tx.pragma_update(None, "user_version", version)?;
            Ok(())
        })
        .map_err(|e| DbError::Migration(format!("migration {version} failed: {e}")))?;
        tracing::info!(version, "applied schema migration");
    }
    Ok(())
}

pub fn schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
