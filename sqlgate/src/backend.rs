//! The capability interface every database backend implements.
//!
//! The orchestrator only ever talks to a database through [Backend], so the same
//! tokenizer, normalizer and ledger logic drive MySQL, PostgreSQL and SQLite alike.

use std::fmt;
use std::time::Duration;

use crate::classify::ErrorKind;

/// A failure reported by the database for a single statement.
///
/// `code` is the backend's native error code rendered as text (a MySQL error number,
/// a PostgreSQL SQLSTATE, a SQLite extended result code). It is `None` when the
/// driver failed without a server-side code, e.g. on a dropped connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementError {
    pub code: Option<String>,
    pub message: String,
}

impl StatementError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    pub fn without_code(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for StatementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for StatementError {}

/// Result of asking the server for the named advisory lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    TimedOut,
    /// The server has no usable advisory-lock primitive.
    Unsupported,
}

/// Database operations needed to run file-based migrations.
///
/// Implementations exist for MySQL ([`MysqlBackend`](crate::mysql::MysqlBackend)),
/// PostgreSQL ([`PostgresBackend`](crate::postgres::PostgresBackend)) and SQLite
/// ([`SqliteBackend`](crate::sqlite::SqliteBackend)), each behind its cargo feature.
pub trait Backend {
    /// Execute one statement, discarding any result set.
    fn execute(&mut self, sql: &str) -> Result<(), StatementError>;

    /// Execute one statement with positional text parameters.
    /// Parameters are referenced with [Backend::placeholder].
    fn execute_with(&mut self, sql: &str, params: &[&str]) -> Result<(), StatementError>;

    /// Run a query and return every column of every row rendered as text.
    fn query_rows(&mut self, sql: &str) -> Result<Vec<Vec<Option<String>>>, StatementError>;

    /// Whether `table` exists in the current database or schema.
    fn table_exists(&mut self, table: &str) -> Result<bool, StatementError>;

    /// Try to take the named server-side lock, waiting at most `timeout`.
    fn acquire_lock(&mut self, name: &str, timeout: Duration)
        -> Result<LockOutcome, StatementError>;

    /// Release a lock taken with [Backend::acquire_lock].
    fn release_lock(&mut self, name: &str) -> Result<(), StatementError>;

    /// Map a failure to its backend-neutral kind, or `None` if it is not one
    /// of the recognized conflict kinds.
    fn error_kind(&self, error: &StatementError) -> Option<ErrorKind>;

    /// `CREATE TABLE IF NOT EXISTS` statement for the ledger table.
    fn ledger_ddl(&self, table: &str) -> String;

    /// Bind marker for the `index`-th (1-based) parameter.
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// SQL expression rendering a timestamp column as UTC text, either as
    /// `YYYY-MM-DD HH:MM:SS`, RFC 3339 or Unix seconds.
    fn timestamp_text(&self, column: &str) -> String {
        format!("CAST({} AS CHAR)", column)
    }

    /// Whether `ADD COLUMN IF NOT EXISTS` style clauses must be stripped before
    /// execution because the server rejects them.
    fn rewrites_conditional_ddl(&self) -> bool {
        true
    }
}
