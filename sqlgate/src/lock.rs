//! Cross-process serialization of migration runs through a server-side advisory lock.

use std::time::Duration;

use crate::backend::{Backend, LockOutcome};
use crate::error::Error;

pub(crate) const DEFAULT_LOCK_NAME: &str = "sqlgate_migrations";
pub(crate) const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// What to do when the server has no advisory-lock primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockPolicy {
    /// Log a warning and run without the lock. The post-lock pending recheck and the
    /// ledger's unique constraint still keep any file from being recorded twice.
    #[default]
    BestEffort,
    /// Refuse to run without the lock.
    Required,
}

/// Acquires the named migration lock for the duration of a run.
#[derive(Debug, Clone)]
pub struct LockCoordinator {
    name: String,
    timeout: Duration,
    policy: LockPolicy,
}

impl LockCoordinator {
    pub fn new(name: impl Into<String>, timeout: Duration, policy: LockPolicy) -> Self {
        Self {
            name: name.into(),
            timeout,
            policy,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take the lock, blocking for at most the configured timeout.
    ///
    /// The returned guard releases the lock when dropped, whichever way the
    /// protected region exits.
    pub fn acquire<'b, B: Backend + ?Sized>(
        &self,
        backend: &'b mut B,
    ) -> Result<LockGuard<'b, B>, Error> {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            lock = %self.name,
            timeout_ms = self.timeout.as_millis(),
            "Acquiring migration lock"
        );

        let outcome = backend
            .acquire_lock(&self.name, self.timeout)
            .map_err(|source| Error::Lock {
                name: self.name.clone(),
                source,
            })?;

        match outcome {
            LockOutcome::Acquired => Ok(LockGuard {
                backend,
                name: self.name.clone(),
                held: true,
            }),
            LockOutcome::TimedOut => Err(Error::LockTimeout {
                name: self.name.clone(),
                timeout: self.timeout,
            }),
            LockOutcome::Unsupported => match self.policy {
                LockPolicy::BestEffort => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        lock = %self.name,
                        "Advisory locks unavailable; running migrations without a lock"
                    );
                    Ok(LockGuard {
                        backend,
                        name: self.name.clone(),
                        held: false,
                    })
                }
                LockPolicy::Required => Err(Error::LockUnavailable {
                    name: self.name.clone(),
                }),
            },
        }
    }
}

/// Holds the migration lock and the backend it was taken on.
/// Dropping the guard releases the lock.
pub struct LockGuard<'b, B: Backend + ?Sized> {
    backend: &'b mut B,
    name: String,
    held: bool,
}

impl<B: Backend + ?Sized> LockGuard<'_, B> {
    /// The backend the lock is held on.
    pub fn backend(&mut self) -> &mut B {
        self.backend
    }

    /// Whether the lock is actually held, as opposed to running in degraded mode.
    pub fn is_held(&self) -> bool {
        self.held
    }
}

impl<B: Backend + ?Sized> Drop for LockGuard<'_, B> {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        match self.backend.release_lock(&self.name) {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(lock = %self.name, "Released migration lock");
            }
            Err(_error) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(lock = %self.name, error = %_error, "Failed to release migration lock");
            }
        }
    }
}
