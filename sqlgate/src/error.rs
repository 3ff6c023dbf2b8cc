use std::path::PathBuf;
use std::time::Duration;

use crate::backend::StatementError;

/// Error type for the sqlgate crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read migration directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read migration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("migration {migration} failed on `{statement}`: {source}")]
    Statement {
        migration: String,
        statement: String,
        #[source]
        source: StatementError,
    },
    #[error("failed to record migration {migration} in the ledger: {source}")]
    Record {
        migration: String,
        #[source]
        source: StatementError,
    },
    #[error("ledger table {table}: {source}")]
    Ledger {
        table: String,
        #[source]
        source: StatementError,
    },
    #[error("failed to acquire migration lock `{name}`: {source}")]
    Lock {
        name: String,
        #[source]
        source: StatementError,
    },
    #[error("timed out after {timeout:?} waiting for migration lock `{name}`")]
    LockTimeout { name: String, timeout: Duration },
    #[error("advisory locks are not available for `{name}` and the lock policy requires one")]
    LockUnavailable { name: String },
    #[error("invalid ledger timestamp: {0}")]
    InvalidTimestamp(String),
    #[cfg(feature = "sqlite")]
    #[error("{0}")]
    Rusqlite(rusqlite::Error),
    #[cfg(feature = "mysql")]
    #[error("{0}")]
    Mysql(String),
    #[cfg(feature = "postgres")]
    #[error("{0}")]
    Postgres(#[from] postgres::Error),
    #[error("{0}")]
    Generic(String),
}

impl Error {
    /// The migration file this error is attributed to, if any.
    pub fn migration(&self) -> Option<&str> {
        match self {
            Self::Statement { migration, .. } | Self::Record { migration, .. } => Some(migration),
            Self::Read { path, .. } => path.file_name().and_then(|n| n.to_str()),
            _ => None,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Self::Rusqlite(value)
    }
}

#[cfg(feature = "mysql")]
impl From<mysql::Error> for Error {
    fn from(value: mysql::Error) -> Self {
        Self::Mysql(value.to_string())
    }
}
