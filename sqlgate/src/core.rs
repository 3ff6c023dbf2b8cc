use std::time::Duration;

use crate::backend::StatementError;
use crate::error::Error;

/// A report of what a migration run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    /// Number of migration files applied by this run.
    pub applied_count: usize,
    /// Number of files pending once the lock was held.
    pub pending_at_lock: usize,
    /// Names of the applied files, in the order they were applied.
    pub applied_files: Vec<String>,
}

type StartHook = Box<dyn Fn(&str) + Send + Sync>;
type CompleteHook = Box<dyn Fn(&str, Duration) + Send + Sync>;
type SkippedHook = Box<dyn Fn(&str, &str, &StatementError) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&str, &Error) + Send + Sync>;

/// Observability callbacks invoked during a run.
#[derive(Default)]
pub(crate) struct Hooks {
    pub on_migration_start: Option<StartHook>,
    pub on_migration_complete: Option<CompleteHook>,
    pub on_statement_skipped: Option<SkippedHook>,
    pub on_migration_error: Option<ErrorHook>,
}

impl Hooks {
    pub fn migration_start(&self, migration: &str) {
        if let Some(ref callback) = self.on_migration_start {
            callback(migration);
        }
    }

    pub fn migration_complete(&self, migration: &str, duration: Duration) {
        if let Some(ref callback) = self.on_migration_complete {
            callback(migration, duration);
        }
    }

    pub fn statement_skipped(&self, migration: &str, statement: &str, error: &StatementError) {
        if let Some(ref callback) = self.on_statement_skipped {
            callback(migration, statement, error);
        }
    }

    pub fn migration_error(&self, migration: &str, error: &Error) {
        if let Some(ref callback) = self.on_migration_error {
            callback(migration, error);
        }
    }
}

// Manual Debug impl since closures don't implement Debug
impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("on_migration_start", &self.on_migration_start.is_some())
            .field(
                "on_migration_complete",
                &self.on_migration_complete.is_some(),
            )
            .field("on_statement_skipped", &self.on_statement_skipped.is_some())
            .field("on_migration_error", &self.on_migration_error.is_some())
            .finish()
    }
}
