#![allow(dead_code)]

//! In-memory test backend.
//!
//! [MemoryServer] stands in for a database server shared by several connections
//! ([MemoryBackend]s), so ledger uniqueness and the advisory lock can be exercised
//! across threads without a real database. It only understands the statements the
//! ledger issues; every other statement is recorded verbatim, or fails if it
//! matches a rule registered with [MemoryServer::fail_when].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::backend::{Backend, LockOutcome, StatementError};
use crate::classify::{self, ErrorKind};
use crate::ledger::DEFAULT_LEDGER_TABLE;

const LEDGER_DDL_SUFFIX: &str = " (memory ledger)";
const APPLIED_AT: &str = "2024-01-01 00:00:00";

#[derive(Default)]
struct State {
    ledgers: HashMap<String, Vec<String>>,
    executed: Vec<String>,
    failures: Vec<(String, StatementError)>,
    lock_holder: Option<u64>,
}

struct Shared {
    state: Mutex<State>,
    lock_freed: Condvar,
    locks_supported: bool,
    statement_delay: Duration,
    next_connection: AtomicU64,
}

#[derive(Clone)]
pub(crate) struct MemoryServer {
    shared: Arc<Shared>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::build(true, Duration::ZERO)
    }

    /// A server without an advisory-lock primitive.
    pub fn without_locks() -> Self {
        Self::build(false, Duration::ZERO)
    }

    /// A server that sleeps before every migration statement, widening race windows.
    pub fn with_statement_delay(delay: Duration) -> Self {
        Self::build(true, delay)
    }

    pub fn build(locks_supported: bool, statement_delay: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                lock_freed: Condvar::new(),
                locks_supported,
                statement_delay,
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    pub fn connect(&self) -> MemoryBackend {
        MemoryBackend {
            shared: Arc::clone(&self.shared),
            id: self.shared.next_connection.fetch_add(1, Ordering::SeqCst),
        }
    }

    /// Fail every statement containing `fragment` with a MySQL-style error code.
    pub fn fail_when(&self, fragment: &str, code: &str, message: &str) {
        self.state()
            .failures
            .push((fragment.to_string(), StatementError::new(code, message)));
    }

    /// Migration statements that executed successfully, in order.
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    /// Rows of the default ledger table.
    pub fn ledger_rows(&self) -> Vec<String> {
        self.state()
            .ledgers
            .get(DEFAULT_LEDGER_TABLE)
            .cloned()
            .unwrap_or_default()
    }

    /// Pre-populate the default ledger table.
    pub fn seed_ledger(&self, rows: &[&str]) {
        self.state()
            .ledgers
            .entry(DEFAULT_LEDGER_TABLE.to_string())
            .or_default()
            .extend(rows.iter().map(|r| r.to_string()));
    }

    pub fn lock_holder(&self) -> Option<u64> {
        self.state().lock_holder
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().unwrap()
    }
}

pub(crate) struct MemoryBackend {
    shared: Arc<Shared>,
    id: u64,
}

impl MemoryBackend {
    pub fn id(&self) -> u64 {
        self.id
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().unwrap()
    }
}

fn missing_table(table: &str) -> StatementError {
    StatementError::new("1146", format!("Table '{}' doesn't exist", table))
}

/// Table name following `prefix`, up to the next space.
fn table_after<'s>(sql: &'s str, prefix: &str) -> Option<&'s str> {
    let rest = sql.strip_prefix(prefix)?;
    Some(rest.split_whitespace().next().unwrap_or(rest))
}

impl Backend for MemoryBackend {
    fn execute(&mut self, sql: &str) -> Result<(), StatementError> {
        if let Some(table) = sql
            .strip_prefix("CREATE TABLE IF NOT EXISTS ")
            .and_then(|rest| rest.strip_suffix(LEDGER_DDL_SUFFIX))
        {
            self.state().ledgers.entry(table.to_string()).or_default();
            return Ok(());
        }

        if !self.shared.statement_delay.is_zero() {
            std::thread::sleep(self.shared.statement_delay);
        }

        let mut state = self.state();
        if let Some((_, error)) = state
            .failures
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
        {
            return Err(error.clone());
        }
        state.executed.push(sql.to_string());
        Ok(())
    }

    fn execute_with(&mut self, sql: &str, params: &[&str]) -> Result<(), StatementError> {
        let table = table_after(sql, "INSERT INTO ")
            .ok_or_else(|| StatementError::new("1064", format!("unsupported: {}", sql)))?;
        let migration = params
            .first()
            .ok_or_else(|| StatementError::new("1210", "missing parameter"))?;

        let mut state = self.state();
        let rows = state
            .ledgers
            .get_mut(table)
            .ok_or_else(|| missing_table(table))?;
        if rows.iter().any(|r| r == migration) {
            return Err(StatementError::new(
                "1062",
                format!("Duplicate entry '{}' for key 'migration'", migration),
            ));
        }
        rows.push(migration.to_string());
        Ok(())
    }

    fn query_rows(&mut self, sql: &str) -> Result<Vec<Vec<Option<String>>>, StatementError> {
        let state = self.state();
        let rows_of = |table: &str| state.ledgers.get(table).ok_or_else(|| missing_table(table));

        if let Some(table) = table_after(sql, "SELECT COUNT(*) FROM ") {
            let count = rows_of(table)?.len();
            return Ok(vec![vec![Some(count.to_string())]]);
        }
        if let Some(table) = table_after(sql, "SELECT migration FROM ") {
            return Ok(rows_of(table)?
                .iter()
                .map(|m| vec![Some(m.clone())])
                .collect());
        }
        if let Some(table) = table_after(sql, "SELECT migration, applied_at FROM ") {
            return Ok(rows_of(table)?
                .iter()
                .map(|m| vec![Some(m.clone()), Some(APPLIED_AT.to_string())])
                .collect());
        }
        Err(StatementError::new("1064", format!("unsupported query: {}", sql)))
    }

    fn table_exists(&mut self, table: &str) -> Result<bool, StatementError> {
        Ok(self.state().ledgers.contains_key(table))
    }

    fn acquire_lock(
        &mut self,
        _name: &str,
        timeout: Duration,
    ) -> Result<LockOutcome, StatementError> {
        if !self.shared.locks_supported {
            return Ok(LockOutcome::Unsupported);
        }
        let deadline = Instant::now() + timeout;
        let mut state = self.state();
        loop {
            match state.lock_holder {
                None => {
                    state.lock_holder = Some(self.id);
                    return Ok(LockOutcome::Acquired);
                }
                Some(holder) if holder == self.id => return Ok(LockOutcome::Acquired),
                Some(_) => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(LockOutcome::TimedOut);
            }
            state = self
                .shared
                .lock_freed
                .wait_timeout(state, deadline - now)
                .unwrap()
                .0;
        }
    }

    fn release_lock(&mut self, _name: &str) -> Result<(), StatementError> {
        let mut state = self.state();
        if state.lock_holder == Some(self.id) {
            state.lock_holder = None;
            self.shared.lock_freed.notify_all();
        }
        Ok(())
    }

    fn error_kind(&self, error: &StatementError) -> Option<ErrorKind> {
        classify::MYSQL.kind_of(error)
    }

    fn ledger_ddl(&self, table: &str) -> String {
        format!("CREATE TABLE IF NOT EXISTS {}{}", table, LEDGER_DDL_SUFFIX)
    }

    fn timestamp_text(&self, column: &str) -> String {
        column.to_string()
    }
}
