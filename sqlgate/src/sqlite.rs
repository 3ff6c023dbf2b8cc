//!
//! # SQLite backend
//!
//! [SqliteBackend] drives migrations over a [`rusqlite`](https://crates.io/crates/rusqlite)
//! connection.
//!
//! SQLite has no advisory lock, so the migration lock reports itself unsupported
//! and a run proceeds under [LockPolicy::BestEffort](crate::LockPolicy::BestEffort).
//! Writers are still serialized by the database file lock; the connection's busy
//! timeout is set to the lock timeout so a second process waits instead of failing
//! with `SQLITE_BUSY`.
//!
//! # Example
//!
//! ```
//! use sqlgate::SqlMigrator;
//! use sqlgate::sqlite::SqliteBackend;
//!
//! let dir = tempfile::tempdir().unwrap();
//! std::fs::write(
//!     dir.path().join("001_users.sql"),
//!     "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);",
//! )
//! .unwrap();
//! std::fs::write(
//!     dir.path().join("002_email.sql"),
//!     "ALTER TABLE users ADD COLUMN email TEXT;",
//! )
//! .unwrap();
//!
//! let mut backend = SqliteBackend::open_in_memory().unwrap();
//! let migrator = SqlMigrator::new(dir.path());
//! let report = migrator.run(&mut backend).unwrap();
//! assert_eq!(report.applied_files, vec!["001_users.sql", "002_email.sql"]);
//!
//! // a second run finds nothing to do
//! assert_eq!(migrator.run(&mut backend).unwrap().applied_count, 0);
//! ```

use std::path::Path;
use std::time::Duration;

use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};

use crate::backend::{Backend, LockOutcome, StatementError};
use crate::classify::{self, ErrorKind};
use crate::error::Error;
use crate::lock::DEFAULT_LOCK_TIMEOUT;

/// A [Backend] over a single SQLite connection.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open (creating if needed) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(DEFAULT_LOCK_TIMEOUT)?;
        Ok(Self::new(conn))
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        Ok(Self::new(Connection::open_in_memory()?))
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn into_inner(self) -> Connection {
        self.conn
    }
}

fn statement_error(error: rusqlite::Error) -> StatementError {
    match error {
        rusqlite::Error::SqliteFailure(failure, message) => StatementError::new(
            failure.extended_code.to_string(),
            message.unwrap_or_else(|| failure.to_string()),
        ),
        other => StatementError::without_code(other.to_string()),
    }
}

fn value_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(v) => Some(v.to_string()),
        ValueRef::Real(v) => Some(v.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl Backend for SqliteBackend {
    fn execute(&mut self, sql: &str) -> Result<(), StatementError> {
        self.conn.execute_batch(sql).map_err(statement_error)
    }

    fn execute_with(&mut self, sql: &str, params: &[&str]) -> Result<(), StatementError> {
        self.conn
            .execute(sql, params_from_iter(params.iter()))
            .map(|_| ())
            .map_err(statement_error)
    }

    fn query_rows(&mut self, sql: &str) -> Result<Vec<Vec<Option<String>>>, StatementError> {
        let mut stmt = self.conn.prepare(sql).map_err(statement_error)?;
        let width = stmt.column_count();
        let mut rows = stmt.query([]).map_err(statement_error)?;

        let mut result = Vec::new();
        while let Some(row) = rows.next().map_err(statement_error)? {
            let values = (0..width)
                .map(|i| row.get_ref(i).map(value_text))
                .collect::<Result<Vec<_>, _>>()
                .map_err(statement_error)?;
            result.push(values);
        }
        Ok(result)
    }

    fn table_exists(&mut self, table: &str) -> Result<bool, StatementError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| count > 0)
            .map_err(statement_error)
    }

    fn acquire_lock(
        &mut self,
        _name: &str,
        timeout: Duration,
    ) -> Result<LockOutcome, StatementError> {
        self.conn.busy_timeout(timeout).map_err(statement_error)?;
        Ok(LockOutcome::Unsupported)
    }

    fn release_lock(&mut self, _name: &str) -> Result<(), StatementError> {
        Ok(())
    }

    fn error_kind(&self, error: &StatementError) -> Option<ErrorKind> {
        classify::SQLITE.kind_of(error)
    }

    fn ledger_ddl(&self, table: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             id INTEGER PRIMARY KEY AUTOINCREMENT, \
             migration TEXT NOT NULL UNIQUE, \
             applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP)",
            table
        )
    }

    fn timestamp_text(&self, column: &str) -> String {
        format!("CAST({} AS TEXT)", column)
    }
}
