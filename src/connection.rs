// Connection-level transaction state and hook notification wiring

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{self, HookConfig};
use crate::driver::{Driver, DriverError};
use crate::hooks::{CommitHookRegistry, HookError, HookResult, SavepointId};

/// Errors from transaction control on a [`Connection`]
#[derive(Debug, Error)]
pub enum TxError {
    #[error("No transaction is active")]
    NoTransaction,

    #[error("Unknown savepoint: {0}")]
    UnknownSavepoint(SavepointId),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Hook(#[from] HookError),
}

/// Transaction phase of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnPhase {
    /// No transaction open; statements autocommit and hooks run inline.
    NoTransaction,
    /// An explicit transaction (possibly with savepoints) is open.
    InTransaction,
    /// COMMIT has been issued but hooks are waiting for the driver to
    /// confirm autocommit is restored.
    CommitPendingAutocommit,
}

/// A database connection with transaction-scoped commit hooks.
///
/// Owns a [`Driver`] and one [`CommitHookRegistry`]. The transaction calls
/// (`begin`, `commit`, `rollback`, savepoints) keep the savepoint stack and
/// forward every lifecycle event to the registry, so hooks registered with
/// [`on_commit`](Self::on_commit) run exactly once after the outermost
/// commit and never after a rollback.
pub struct Connection<D> {
    driver: D,
    hooks: CommitHookRegistry,
    in_transaction: bool,
    /// Active savepoints, outermost first.
    savepoints: Vec<SavepointId>,
    next_savepoint: u64,
    rollback_only: bool,
}

impl<D: Driver> Connection<D> {
    /// Wrap `driver` with a fresh hook registry using the global config.
    pub fn new(driver: D) -> Self {
        Self::with_config(driver, config::config().clone())
    }

    /// Wrap `driver` with an explicit hook configuration.
    pub fn with_config(driver: D, config: HookConfig) -> Self {
        Self {
            driver,
            hooks: CommitHookRegistry::with_config(config),
            in_transaction: false,
            savepoints: Vec::new(),
            next_savepoint: 0,
            rollback_only: false,
        }
    }

    /// Current transaction phase.
    pub fn phase(&self) -> TxnPhase {
        if self.in_transaction {
            TxnPhase::InTransaction
        } else if self.hooks.awaiting_autocommit() {
            TxnPhase::CommitPendingAutocommit
        } else {
            TxnPhase::NoTransaction
        }
    }

    /// Whether an explicit transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Savepoints currently active, outermost first.
    pub fn active_savepoints(&self) -> &[SavepointId] {
        &self.savepoints
    }

    /// Number of hooks waiting for commit.
    pub fn pending_hooks(&self) -> usize {
        self.hooks.pending_hooks()
    }

    /// Access the underlying driver, e.g. to run application statements on
    /// the same session.
    pub fn driver(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Register `action` to run after the current transaction commits.
    ///
    /// Outside a transaction the action runs inline before this call
    /// returns. Inside one it is deferred until the outermost commit;
    /// rolling back the transaction, or a savepoint that was active at
    /// registration time, discards it. Actions run on the committing call's
    /// context, so they should be quick and must not expect the transaction
    /// to still be open. Some drivers cannot open a new transaction from an
    /// action that runs in the delayed-autocommit window.
    pub fn on_commit<F>(&mut self, action: F) -> Result<(), HookError>
    where
        F: FnOnce() -> HookResult + Send + 'static,
    {
        self.hooks
            .register(Box::new(action), self.in_transaction, &self.savepoints)
    }

    // ========================================
    // Transaction lifecycle
    // ========================================

    /// Open a transaction, or create a savepoint when one is already open.
    pub async fn begin(&mut self) -> Result<(), TxError> {
        if self.in_transaction {
            self.savepoint().await?;
            return Ok(());
        }

        self.driver.set_autocommit(false).await?;
        self.driver.execute("BEGIN").await?;
        self.in_transaction = true;
        self.rollback_only = false;
        debug!("Transaction started");
        Ok(())
    }

    /// Create a savepoint inside the open transaction.
    pub async fn savepoint(&mut self) -> Result<SavepointId, TxError> {
        if !self.in_transaction {
            return Err(TxError::NoTransaction);
        }

        self.next_savepoint += 1;
        let sid = SavepointId::new(self.next_savepoint);
        self.driver.execute(&format!("SAVEPOINT {}", sid)).await?;
        self.savepoints.push(sid);
        debug!("Created savepoint {}", sid);
        Ok(sid)
    }

    /// Release `sid`, merging its changes into the enclosing scope.
    /// Savepoints nested inside `sid` are released with it.
    pub async fn release_savepoint(&mut self, sid: SavepointId) -> Result<(), TxError> {
        let index = self.position_of(sid)?;
        self.driver
            .execute(&format!("RELEASE SAVEPOINT {}", sid))
            .await?;
        self.savepoints.truncate(index);
        debug!("Released savepoint {}", sid);
        Ok(())
    }

    /// Roll back to `sid`, discarding its work and every hook registered
    /// while it (or a savepoint nested inside it) was active.
    pub async fn rollback_to_savepoint(&mut self, sid: SavepointId) -> Result<(), TxError> {
        let index = self.position_of(sid)?;
        self.driver
            .execute(&format!("ROLLBACK TO SAVEPOINT {}", sid))
            .await?;
        // Savepoints nested inside sid die with it; their hooks carry sid in
        // their scope snapshot and are discarded by the same notification.
        self.savepoints.truncate(index);
        self.hooks.on_savepoint_rollback(sid);
        debug!("Rolled back to savepoint {}", sid);
        Ok(())
    }

    /// Release the innermost savepoint, or commit the outermost transaction.
    ///
    /// The outermost commit issues COMMIT and then either drains the pending
    /// hooks (drivers that restore autocommit immediately) or holds them in
    /// [`TxnPhase::CommitPendingAutocommit`] until
    /// [`set_autocommit`](Self::set_autocommit) confirms restoration. Hook
    /// failures surface here only after every hook has been attempted. A
    /// transaction marked rollback-only rolls back instead and reports
    /// success, since the failure that poisoned it was already returned to
    /// the caller.
    pub async fn commit(&mut self) -> Result<(), TxError> {
        if !self.in_transaction {
            return Err(TxError::NoTransaction);
        }
        if let Some(&sid) = self.savepoints.last() {
            return self.release_savepoint(sid).await;
        }
        if self.rollback_only {
            warn!("Transaction is marked rollback-only; rolling back instead of committing");
            return self.rollback().await;
        }

        self.driver.execute("COMMIT").await?;
        self.in_transaction = false;
        debug!("Transaction committed");

        let restored = self.driver.features().autocommit_restored_immediately;
        self.hooks.on_commit(restored)?;
        Ok(())
    }

    /// Roll back to the innermost savepoint, or the whole transaction.
    pub async fn rollback(&mut self) -> Result<(), TxError> {
        if !self.in_transaction {
            return Err(TxError::NoTransaction);
        }
        if let Some(&sid) = self.savepoints.last() {
            return self.rollback_to_savepoint(sid).await;
        }

        self.driver.execute("ROLLBACK").await?;
        self.in_transaction = false;
        self.rollback_only = false;
        self.hooks.on_full_rollback();
        debug!("Transaction rolled back");
        Ok(())
    }

    /// Toggle driver autocommit. Turning it on releases hooks that were
    /// waiting for autocommit to come back after a commit.
    pub async fn set_autocommit(&mut self, enabled: bool) -> Result<(), TxError> {
        self.driver.set_autocommit(enabled).await?;
        if enabled {
            self.hooks.on_autocommit_restored()?;
        }
        Ok(())
    }

    /// Mark the open transaction so the outermost commit degrades to a
    /// rollback. Used when a merged (savepoint-less) inner scope fails and
    /// its work cannot be unwound separately.
    pub fn mark_rollback_only(&mut self) -> Result<(), TxError> {
        if !self.in_transaction {
            return Err(TxError::NoTransaction);
        }
        self.rollback_only = true;
        Ok(())
    }

    /// Whether the open transaction was marked rollback-only.
    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    /// Re-establish the underlying session. Pending hooks never survive a
    /// reconnect.
    pub async fn reset(&mut self) -> Result<(), TxError> {
        self.driver.reset().await?;
        self.clear_transaction_state();
        info!("Connection reset");
        Ok(())
    }

    /// Close the underlying session, discarding any pending hooks.
    pub async fn close(&mut self) -> Result<(), TxError> {
        self.driver.close().await?;
        self.clear_transaction_state();
        info!("Connection closed");
        Ok(())
    }

    fn clear_transaction_state(&mut self) {
        self.in_transaction = false;
        self.savepoints.clear();
        self.rollback_only = false;
        self.hooks.on_connection_reset();
    }

    fn position_of(&self, sid: SavepointId) -> Result<usize, TxError> {
        self.savepoints
            .iter()
            .position(|&s| s == sid)
            .ok_or(TxError::UnknownSavepoint(sid))
    }
}
