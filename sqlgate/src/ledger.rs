//! The ledger: one row per migration file that has been applied.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::backend::{Backend, StatementError};
use crate::classify::ErrorKind;
use crate::error::Error;

pub(crate) const DEFAULT_LEDGER_TABLE: &str = "schema_migrations";

/// A migration recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// File name of the migration.
    pub migration: String,
    /// When the ledger row was written.
    pub applied_at: DateTime<Utc>,
}

/// Reads and writes the ledger table.
///
/// Uniqueness of `migration` is enforced by the table itself, which is what keeps
/// two racing runners from both recording the same file.
#[derive(Debug, Clone)]
pub struct Ledger {
    table: String,
}

impl Ledger {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the ledger table if it is missing.
    /// Returns whether the table held no rows, which is the case on the very first run.
    pub fn ensure_table<B: Backend + ?Sized>(&self, backend: &mut B) -> Result<bool, Error> {
        let ddl = backend.ledger_ddl(&self.table);
        if let Err(e) = backend.execute(&ddl) {
            // A concurrent runner can win the CREATE race even with IF NOT EXISTS.
            if !self.exists(backend)? {
                return Err(self.error(e));
            }
        }

        let rows = backend
            .query_rows(&format!("SELECT COUNT(*) FROM {}", self.table))
            .map_err(|e| self.error(e))?;
        let count = rows
            .first()
            .and_then(|row| row.first())
            .and_then(|value| value.as_deref())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .ok_or_else(|| {
                Error::Generic(format!("unexpected row count result from {}", self.table))
            })?;

        Ok(count == 0)
    }

    /// Whether the ledger table has been created.
    pub fn exists<B: Backend + ?Sized>(&self, backend: &mut B) -> Result<bool, Error> {
        backend.table_exists(&self.table).map_err(|e| self.error(e))
    }

    /// Names of every migration recorded so far.
    pub fn applied<B: Backend + ?Sized>(&self, backend: &mut B) -> Result<BTreeSet<String>, Error> {
        let rows = backend
            .query_rows(&format!("SELECT migration FROM {}", self.table))
            .map_err(|e| self.error(e))?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .collect())
    }

    /// Record `migration` as applied.
    ///
    /// With `tolerate_existing`, a unique violation means a concurrent runner already
    /// recorded the same file, and is not an error.
    pub fn record<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        migration: &str,
        tolerate_existing: bool,
    ) -> Result<(), Error> {
        let sql = format!(
            "INSERT INTO {} (migration) VALUES ({})",
            self.table,
            backend.placeholder(1)
        );
        match backend.execute_with(&sql, &[migration]) {
            Ok(()) => Ok(()),
            Err(e) if tolerate_existing && backend.error_kind(&e) == Some(ErrorKind::DuplicateValue) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    migration = migration,
                    error = %e,
                    "Migration already recorded in ledger"
                );
                Ok(())
            }
            Err(source) => Err(Error::Record {
                migration: migration.to_string(),
                source,
            }),
        }
    }

    /// Every ledger row in the order it was written.
    /// A ledger table that does not exist yet reads as an empty history.
    pub fn entries<B: Backend + ?Sized>(&self, backend: &mut B) -> Result<Vec<LedgerEntry>, Error> {
        if !self.exists(backend)? {
            return Ok(vec![]);
        }
        let sql = format!(
            "SELECT migration, {} FROM {} ORDER BY id",
            backend.timestamp_text("applied_at"),
            self.table
        );
        let rows = backend.query_rows(&sql).map_err(|e| self.error(e))?;

        rows.into_iter()
            .map(|row| {
                let mut columns = row.into_iter();
                let migration = columns.next().flatten().unwrap_or_default();
                let applied_at = columns.next().flatten().unwrap_or_default();
                Ok(LedgerEntry {
                    migration,
                    applied_at: parse_timestamp(&applied_at)?,
                })
            })
            .collect()
    }

    fn error(&self, source: StatementError) -> Error {
        Error::Ledger {
            table: self.table.clone(),
            source,
        }
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_TABLE)
    }
}

/// Parse `YYYY-MM-DD HH:MM:SS[.fff]` as UTC, also accepting RFC 3339 and Unix seconds.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, Error> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<i64>() {
        return DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| Error::InvalidTimestamp(format!("'{}': out of range", value)));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::InvalidTimestamp(format!("'{}': {}", value, e)))
}
