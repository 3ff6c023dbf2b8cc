//! The migration orchestrator.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::backend::{Backend, StatementError};
use crate::classify::ErrorClass;
use crate::compat::{normalize, split_alter};
use crate::core::{Hooks, RunResult};
use crate::discover::{discover, MigrationFile};
use crate::error::Error;
use crate::ledger::{Ledger, LedgerEntry};
use crate::lock::{LockCoordinator, LockPolicy, DEFAULT_LOCK_NAME, DEFAULT_LOCK_TIMEOUT};
use crate::tokenizer::split_statements;

/// Name of the full schema dump kept next to the migrations, never applied as one.
pub(crate) const DEFAULT_BASELINE: &str = "schema.sql";

/// The entrypoint for applying a directory of `.sql` migration files.
///
/// Files are applied in ascending file-name order, each exactly once; the ledger
/// table records which ones have run. A run holds a server-side advisory lock so
/// that several instances starting at once apply every file a single time between
/// them.
///
/// ```no_run
/// use sqlgate::SqlMigrator;
/// use sqlgate::sqlite::SqliteBackend;
///
/// let mut backend = SqliteBackend::open("app.db")?;
/// let report = SqlMigrator::new("migrations").run(&mut backend)?;
/// println!("applied {:?}", report.applied_files);
/// # Ok::<(), sqlgate::Error>(())
/// ```
#[derive(Debug)]
pub struct SqlMigrator {
    dir: PathBuf,
    extension: String,
    excluded: Vec<String>,
    ledger: Ledger,
    lock_name: String,
    lock_timeout: Duration,
    lock_policy: LockPolicy,
    tolerate_existing: Option<bool>,
    hooks: Hooks,
}

impl SqlMigrator {
    /// Create a migrator for the `.sql` files in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: "sql".to_string(),
            excluded: vec![DEFAULT_BASELINE.to_string()],
            ledger: Ledger::default(),
            lock_name: DEFAULT_LOCK_NAME.to_string(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            lock_policy: LockPolicy::default(),
            tolerate_existing: None,
            hooks: Hooks::default(),
        }
    }

    /// File extension of migration files, without the dot. Defaults to `sql`.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Exclude another file name from the migration set, e.g. a baseline schema dump.
    pub fn with_baseline(mut self, name: impl Into<String>) -> Self {
        self.excluded.push(name.into());
        self
    }

    /// Replace the set of excluded file names. Defaults to `schema.sql`.
    pub fn with_excluded(mut self, names: Vec<String>) -> Self {
        self.excluded = names;
        self
    }

    /// Set a custom name for the ledger table. Defaults to `schema_migrations`.
    pub fn with_ledger_table(mut self, table: impl Into<String>) -> Self {
        self.ledger = Ledger::new(table);
        self
    }

    /// Set the advisory lock name. Defaults to `sqlgate_migrations`.
    pub fn with_lock_name(mut self, name: impl Into<String>) -> Self {
        self.lock_name = name.into();
        self
    }

    /// How long to wait for another instance to finish migrating. Defaults to 10 seconds.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// What to do when the server offers no advisory lock. Defaults to [LockPolicy::BestEffort].
    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    /// Whether to skip statements failing because their object already exists (or,
    /// for drops, is already gone).
    ///
    /// When unset, this is enabled only while the ledger is empty: a schema that
    /// predates the ledger was most likely bootstrapped by hand.
    pub fn with_tolerate_existing(mut self, tolerate: bool) -> Self {
        self.tolerate_existing = Some(tolerate);
        self
    }

    /// Set a callback to be invoked when a migration file starts.
    /// The callback receives the file name.
    pub fn on_migration_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.hooks.on_migration_start = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a migration file has been applied and recorded.
    /// The callback receives the file name and duration.
    pub fn on_migration_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, Duration) + Send + Sync + 'static,
    {
        self.hooks.on_migration_complete = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a statement is skipped because of a tolerated
    /// conflict. The callback receives the file name, the statement and the error.
    pub fn on_statement_skipped<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &str, &StatementError) + Send + Sync + 'static,
    {
        self.hooks.on_statement_skipped = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a migration file fails.
    /// The callback receives the file name and error.
    pub fn on_migration_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &Error) + Send + Sync + 'static,
    {
        self.hooks.on_migration_error = Some(Box::new(callback));
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ledger_table(&self) -> &str {
        self.ledger.table()
    }

    pub fn lock_name(&self) -> &str {
        &self.lock_name
    }

    /// All migration files in the directory, in application order.
    pub fn discover(&self) -> Result<Vec<MigrationFile>, Error> {
        discover(&self.dir, &self.extension, &self.excluded)
    }

    /// Files [SqlMigrator::run] would apply right now. Takes no lock and writes nothing.
    pub fn preview<B: Backend + ?Sized>(&self, backend: &mut B) -> Result<Vec<MigrationFile>, Error> {
        let files = self.discover()?;
        if !self.ledger.exists(backend)? {
            return Ok(files);
        }
        let applied = self.ledger.applied(backend)?;
        Ok(pending(&files, &applied).into_iter().cloned().collect())
    }

    /// Migrations recorded in the ledger, oldest first.
    pub fn history<B: Backend + ?Sized>(&self, backend: &mut B) -> Result<Vec<LedgerEntry>, Error> {
        self.ledger.entries(backend)
    }

    /// Apply every pending migration file.
    ///
    /// Returns as soon as a file fails; files after it are not attempted. The
    /// advisory lock is released before this returns, whether it succeeds or not.
    pub fn run<B: Backend + ?Sized>(&self, backend: &mut B) -> Result<RunResult, Error> {
        let files = self.discover()?;
        let ledger_was_empty = self.ledger.ensure_table(backend)?;
        let tolerate_existing = self.tolerate_existing.unwrap_or(ledger_was_empty);

        let applied = self.ledger.applied(backend)?;
        if pending(&files, &applied).is_empty() {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                available = files.len(),
                "No pending migrations"
            );
            return Ok(RunResult::default());
        }

        let lock = LockCoordinator::new(&self.lock_name, self.lock_timeout, self.lock_policy);
        let mut guard = lock.acquire(backend)?;
        let backend = guard.backend();

        // Other instances may have applied some of these while we waited for the lock.
        let applied = self.ledger.applied(backend)?;
        let pending = pending(&files, &applied);

        #[cfg(feature = "tracing")]
        tracing::info!(
            pending = ?pending.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            tolerate_existing = tolerate_existing,
            "Applying pending migrations"
        );

        let mut result = RunResult {
            pending_at_lock: pending.len(),
            ..RunResult::default()
        };
        for file in pending {
            self.apply_file(backend, file, tolerate_existing)?;
            result.applied_count += 1;
            result.applied_files.push(file.name.clone());
        }

        Ok(result)
    }

    fn apply_file<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        file: &MigrationFile,
        tolerate_existing: bool,
    ) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("sqlgate_migration", migration = %file.name).entered();

        #[cfg(feature = "tracing")]
        tracing::info!("Starting migration");

        self.hooks.migration_start(&file.name);
        let started = Instant::now();

        let outcome = file.read_sql().and_then(|sql| {
            for statement in split_statements(&sql) {
                self.apply_statement(backend, &file.name, &statement, tolerate_existing)?;
            }
            self.ledger.record(backend, &file.name, tolerate_existing)
        });

        match outcome {
            Ok(()) => {
                let duration = started.elapsed();

                #[cfg(feature = "tracing")]
                tracing::info!(
                    duration_ms = duration.as_millis(),
                    "Migration completed successfully"
                );

                self.hooks.migration_complete(&file.name, duration);
                Ok(())
            }
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %error, "Migration failed");

                self.hooks.migration_error(&file.name, &error);
                Err(error)
            }
        }
    }

    fn apply_statement<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        migration: &str,
        statement: &str,
        tolerate_existing: bool,
    ) -> Result<(), Error> {
        let sql = prepare(backend, statement);
        let error = match backend.execute(&sql) {
            Ok(()) => return Ok(()),
            Err(error) => error,
        };

        if !tolerate_existing
            || ErrorClass::of_statement(backend.error_kind(&error), &sql) == ErrorClass::Fatal
        {
            return Err(Error::Statement {
                migration: migration.to_string(),
                statement: sql,
                source: error,
            });
        }

        let operations = match split_alter(&sql) {
            Some(operations) if operations.len() > 1 => operations,
            _ => {
                self.skip(migration, &sql, &error);
                return Ok(());
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            statement = %sql,
            operations = operations.len(),
            "Retrying ALTER TABLE one operation at a time"
        );

        for operation in operations {
            let operation = prepare(backend, &operation);
            match backend.execute(&operation) {
                Ok(()) => {}
                Err(error)
                    if ErrorClass::of_statement(backend.error_kind(&error), &operation)
                        == ErrorClass::Tolerable =>
                {
                    self.skip(migration, &operation, &error);
                }
                Err(source) => {
                    return Err(Error::Statement {
                        migration: migration.to_string(),
                        statement: operation,
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    fn skip(&self, migration: &str, statement: &str, error: &StatementError) {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            statement = %statement,
            error = %error,
            "Skipping statement; its change is already present"
        );

        self.hooks.statement_skipped(migration, statement, error);
    }
}

fn prepare<B: Backend + ?Sized>(backend: &B, statement: &str) -> String {
    if backend.rewrites_conditional_ddl() {
        normalize(statement).into_owned()
    } else {
        statement.to_string()
    }
}

fn pending<'f>(files: &'f [MigrationFile], applied: &BTreeSet<String>) -> Vec<&'f MigrationFile> {
    files.iter().filter(|f| !applied.contains(&f.name)).collect()
}
