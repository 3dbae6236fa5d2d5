//! Transaction helpers

use rusqlite::{Connection, Transaction, TransactionBehavior};

use super::Result;

/// Run `operation` inside a transaction, committing on success.
///
/// Dropping the uncommitted transaction on error rolls it back.
///
/// ```rust,no_run
/// # use study_store::transactions::execute_in_transaction;
/// # use rusqlite::{Connection, TransactionBehavior};
/// # fn example(conn: &mut Connection) -> study_store::Result<()> {
/// execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
///     tx.execute("DELETE FROM items", [])?;
///     Ok(())
/// })?;
/// # Ok(())
/// # }
/// ```
pub fn execute_in_transaction<F, T>(
    conn: &mut Connection,
    behavior: TransactionBehavior,
    operation: F,
) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction_with_behavior(behavior)?;
    let result = operation(&tx)?;
    tx.commit()?;
    Ok(result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::DbError;

    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (value INTEGER NOT NULL)", [])
            .unwrap();
        conn
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_commit_on_success() {
        let mut conn = setup_test_db();
        let inserted = execute_in_transaction(&mut conn, TransactionBehavior::Immediate, |tx| {
            for value in 0..3 {
                tx.execute("INSERT INTO t (value) VALUES (?1)", [value])?;
            }
            Ok(3)
        })
        .unwrap();
        assert_eq!(inserted, 3);
        assert_eq!(count(&conn), 3);
    }

    #[test]
    fn test_rollback_on_error() {
        let mut conn = setup_test_db();
        let result: Result<()> =
            execute_in_transaction(&mut conn, TransactionBehavior::Immediate, |tx| {
                tx.execute("INSERT INTO t (value) VALUES (1)", [])?;
                Err(DbError::Corrupt("abort".to_string()))
            });
        assert!(result.is_err());
        assert_eq!(count(&conn), 0);
    }
}
