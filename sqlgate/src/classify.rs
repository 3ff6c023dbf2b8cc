//! Classification of backend errors into conflicts that are safe to skip.
//!
//! Every backend reports "this already exists" differently. A [CodeTable] maps a
//! backend's native codes (and, for SQLite, message fragments) onto a small set of
//! [ErrorKind]s. Adding a backend means adding a table, not new branching logic.

use crate::backend::StatementError;
use crate::compat;

/// Backend-neutral kind of a recognized conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Table, index, constraint or other object already exists.
    AlreadyExists,
    /// Duplicate column or key/index name.
    DuplicateName,
    /// Unique or primary-key violation, typically from a backfill insert.
    DuplicateValue,
    /// Table, column or index does not exist. Only tolerable for drops.
    MissingTarget,
}

/// Whether a statement failure may be skipped when tolerate-existing mode is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Tolerable,
    Fatal,
}

impl ErrorClass {
    /// Unrecognized errors are always fatal.
    pub fn of(kind: Option<ErrorKind>) -> Self {
        match kind {
            Some(_) => Self::Tolerable,
            None => Self::Fatal,
        }
    }

    /// Class of `kind` raised by `statement`. A missing target is fatal unless
    /// the statement was dropping something, so a typo in an `INSERT` or an index
    /// on an unknown column is never skipped.
    pub fn of_statement(kind: Option<ErrorKind>, statement: &str) -> Self {
        match kind {
            Some(ErrorKind::MissingTarget) if !compat::is_drop(statement) => Self::Fatal,
            kind => Self::of(kind),
        }
    }
}

/// Lookup table from backend error codes and messages to [ErrorKind]s.
#[derive(Debug, Clone, Copy)]
pub struct CodeTable {
    codes: &'static [(&'static str, ErrorKind)],
    /// Case-insensitive message fragments, consulted when no code matches.
    messages: &'static [(&'static str, ErrorKind)],
}

impl CodeTable {
    pub const fn new(
        codes: &'static [(&'static str, ErrorKind)],
        messages: &'static [(&'static str, ErrorKind)],
    ) -> Self {
        Self { codes, messages }
    }

    pub fn kind_of(&self, error: &StatementError) -> Option<ErrorKind> {
        if let Some(code) = error.code.as_deref() {
            if let Some((_, kind)) = self.codes.iter().find(|(c, _)| *c == code) {
                return Some(*kind);
            }
        }
        let message = error.message.to_ascii_lowercase();
        self.messages
            .iter()
            .find(|(fragment, _)| message.contains(fragment))
            .map(|(_, kind)| *kind)
    }

    pub fn classify(&self, statement: &str, error: &StatementError) -> ErrorClass {
        ErrorClass::of_statement(self.kind_of(error), statement)
    }
}

/// MySQL / MariaDB server error numbers.
pub const MYSQL: CodeTable = CodeTable::new(
    &[
        ("1050", ErrorKind::AlreadyExists),  // ER_TABLE_EXISTS_ERROR
        ("1060", ErrorKind::DuplicateName),  // ER_DUP_FIELDNAME
        ("1061", ErrorKind::DuplicateName),  // ER_DUP_KEYNAME
        ("1826", ErrorKind::DuplicateName),  // ER_FK_DUP_NAME
        ("1062", ErrorKind::DuplicateValue), // ER_DUP_ENTRY
        ("1022", ErrorKind::DuplicateValue), // ER_DUP_KEY
        ("1091", ErrorKind::MissingTarget),  // ER_CANT_DROP_FIELD_OR_KEY
        ("1051", ErrorKind::MissingTarget),  // ER_BAD_TABLE_ERROR
    ],
    &[],
);

/// PostgreSQL SQLSTATE codes.
pub const POSTGRES: CodeTable = CodeTable::new(
    &[
        ("42P07", ErrorKind::AlreadyExists), // duplicate_table (also indexes)
        ("42710", ErrorKind::AlreadyExists), // duplicate_object
        ("42P06", ErrorKind::AlreadyExists), // duplicate_schema
        ("42701", ErrorKind::DuplicateName), // duplicate_column
        ("23505", ErrorKind::DuplicateValue), // unique_violation
        ("42704", ErrorKind::MissingTarget), // undefined_object
        ("42P01", ErrorKind::MissingTarget), // undefined_table
        ("42703", ErrorKind::MissingTarget), // undefined_column
    ],
    &[],
);

/// SQLite reports most schema conflicts as a plain `SQLITE_ERROR`, so only
/// constraint violations are told apart by extended code.
pub const SQLITE: CodeTable = CodeTable::new(
    &[
        ("2067", ErrorKind::DuplicateValue), // SQLITE_CONSTRAINT_UNIQUE
        ("1555", ErrorKind::DuplicateValue), // SQLITE_CONSTRAINT_PRIMARYKEY
    ],
    &[
        ("already exists", ErrorKind::AlreadyExists),
        ("duplicate column name", ErrorKind::DuplicateName),
        ("no such table", ErrorKind::MissingTarget),
        ("no such index", ErrorKind::MissingTarget),
        ("no such column", ErrorKind::MissingTarget),
    ],
);
