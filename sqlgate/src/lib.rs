#![cfg_attr(docsrs, feature(doc_cfg))]
//! `sqlgate` applies a directory of SQL migration files to a database, each exactly once.
//!
//! Core concepts:
//! - A migration is a plain `.sql` file. Files are applied in ascending file-name order,
//!   and the file name is recorded in a ledger table once the file has run.
//! - Several instances may start at the same moment (e.g. replicas of one service).
//!   A run takes a server-side advisory lock and re-reads the ledger once it holds it,
//!   so every file is applied by exactly one of them.
//! - A database that was bootstrapped by hand before the ledger existed is not an
//!   error: while the ledger is empty, statements failing because their object is
//!   already there (or, for drops, already gone) are logged and skipped.
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
//!     "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);\n\
//!      INSERT INTO users (name) VALUES ('semi;colon');",
//! )
//! .unwrap();
//!
//! let mut backend = SqliteBackend::open_in_memory().unwrap();
//! let report = SqlMigrator::new(dir.path()).run(&mut backend).unwrap();
//! assert_eq!(report.applied_count, 1);
//! assert_eq!(report.applied_files, vec!["001_users.sql"]);
//! ```
//!
//! # SQL handling
//!
//! - Files are split into statements on `;`, except inside string literals, quoted
//!   identifiers and comments. See [split_statements].
//! - `ADD COLUMN IF NOT EXISTS` and the `INDEX`/`KEY` variants are rewritten to the
//!   plain form on servers that reject them. See [normalize].
//! - A compound `ALTER TABLE` that fails on an existing object is retried one
//!   operation at a time. See [split_alter].
//!
//! # Benefits
//! - Preview / dry-run support ([SqlMigrator::preview]).
//! - Migration history querying ([SqlMigrator::history]).
//! - Observability hooks.
//! - Tracing integration - available with the `tracing` feature flag.
//!
//! # Database support
//!
//! - [`SQLite`](sqlite) - available with the `sqlite` feature flag.
//! - [`MySQL`](mysql) - available with the `mysql` feature flag.
//! - [`PostgreSQL`](postgres) - available with the `postgres` feature flag.
//!
//! Any other database can be driven by implementing [Backend].

mod backend;
pub use backend::{Backend, LockOutcome, StatementError};

mod classify;
pub use classify::{CodeTable, ErrorClass, ErrorKind};

/// Per-backend error code tables.
pub mod codes {
    pub use crate::classify::{MYSQL, POSTGRES, SQLITE};
}

mod compat;
pub use compat::{normalize, split_alter};

mod core;
pub use crate::core::RunResult;

mod discover;
pub use discover::MigrationFile;

mod error;
pub use error::Error;

mod ledger;
pub use ledger::{Ledger, LedgerEntry};

mod lock;
pub use lock::{LockCoordinator, LockGuard, LockPolicy};

mod migrator;
pub use migrator::SqlMigrator;

mod tokenizer;
pub use tokenizer::split_statements;

#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite;

#[cfg(feature = "mysql")]
#[cfg_attr(docsrs, doc(cfg(feature = "mysql")))]
pub mod mysql;

#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres;

#[cfg(test)]
pub(crate) mod test_memory;

#[cfg(all(test, feature = "integration", feature = "mysql"))]
pub(crate) mod test_mysql;

#[cfg(all(test, feature = "integration", feature = "postgres"))]
pub(crate) mod test_postgres;
