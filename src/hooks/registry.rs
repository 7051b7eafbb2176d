// Transaction-scoped commit hook bookkeeping

use std::fmt;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::{self, HookConfig};
use crate::hooks::error::{HookError, HookResult};

/// Identifier for a savepoint, unique within one transaction.
///
/// Minted by whoever manages the transaction (a connection's savepoint
/// counter, or an external manager via [`SavepointId::new`]). The registry
/// only ever compares ids; the display form doubles as the SQL savepoint
/// name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SavepointId(u64);

impl SavepointId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SavepointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sp_{}", self.0)
    }
}

/// A deferred hook action. Runs at most once; failures are reported through
/// [`HookError`] and never retried.
pub type HookFn = Box<dyn FnOnce() -> HookResult + Send + 'static>;

/// A hook waiting for the enclosing transaction to commit, tagged with the
/// savepoint stack that was active when it was registered (outermost first).
struct PendingHook {
    scope: Vec<SavepointId>,
    action: HookFn,
}

/// Bookkeeping for transaction-scoped commit hooks.
///
/// Owned by a connection and driven through the `on_*` notifications as the
/// transaction moves through its lifecycle. Hooks run in registration order,
/// exactly once, and only after the outermost transaction commits; rolling
/// back the transaction, or a savepoint that was active at registration,
/// discards them instead.
pub struct CommitHookRegistry {
    /// Hooks pending execution, in registration order.
    pending: Vec<PendingHook>,
    /// Set when COMMIT has been issued but hooks must wait until the driver
    /// confirms autocommit is restored.
    run_on_autocommit_restore: bool,
    config: HookConfig,
}

impl CommitHookRegistry {
    /// Create a registry using the global configuration.
    pub fn new() -> Self {
        Self::with_config(config::config().clone())
    }

    /// Create a registry with an explicit configuration.
    pub fn with_config(config: HookConfig) -> Self {
        Self {
            pending: Vec::new(),
            run_on_autocommit_restore: false,
            config,
        }
    }

    /// Register `action` to run after the current transaction commits.
    ///
    /// Outside a transaction there is nothing to wait for: the action runs
    /// inline, before this call returns, and never enters the pending list.
    /// Inside a transaction the action is appended together with a snapshot
    /// of the active savepoint stack and the call returns immediately.
    pub fn register(
        &mut self,
        action: HookFn,
        in_transaction: bool,
        active_savepoints: &[SavepointId],
    ) -> Result<(), HookError> {
        if !in_transaction {
            return action().map_err(HookError::Immediate);
        }

        self.pending.push(PendingHook {
            scope: active_savepoints.to_vec(),
            action,
        });
        debug!(
            "Deferred commit hook at savepoint depth {} ({} pending)",
            active_savepoints.len(),
            self.pending.len()
        );
        Ok(())
    }

    /// The outermost COMMIT was issued successfully.
    ///
    /// When the driver reports autocommit as already restored the pending
    /// hooks drain inline. Otherwise they are held until
    /// [`on_autocommit_restored`](Self::on_autocommit_restored); running them
    /// earlier would let a hook observe the session still in manual-commit
    /// mode.
    pub fn on_commit(&mut self, autocommit_restored_immediately: bool) -> Result<(), HookError> {
        if autocommit_restored_immediately {
            self.drain()
        } else {
            self.run_on_autocommit_restore = true;
            Ok(())
        }
    }

    /// The driver confirmed autocommit mode is back on.
    ///
    /// Drains hooks held back by a previous [`on_commit`](Self::on_commit);
    /// a plain autocommit toggle with no commit behind it runs nothing.
    pub fn on_autocommit_restored(&mut self) -> Result<(), HookError> {
        if !self.run_on_autocommit_restore {
            return Ok(());
        }
        self.run_on_autocommit_restore = false;
        self.drain()
    }

    /// A savepoint was rolled back: discard every hook registered while it
    /// was active, including hooks from savepoints nested inside it. Hooks
    /// from enclosing scopes survive in order. Unknown ids are a no-op.
    pub fn on_savepoint_rollback(&mut self, sid: SavepointId) {
        let before = self.pending.len();
        self.pending.retain(|hook| !hook.scope.contains(&sid));
        let discarded = before - self.pending.len();
        if discarded > 0 {
            debug!("Discarded {} commit hooks from rolled-back savepoint {}", discarded, sid);
        }
    }

    /// The whole transaction rolled back: nothing it scheduled may run.
    pub fn on_full_rollback(&mut self) {
        if !self.pending.is_empty() {
            debug!("Discarded {} commit hooks on rollback", self.pending.len());
        }
        self.pending.clear();
    }

    /// The connection was reset or closed: drop all hook state.
    pub fn on_connection_reset(&mut self) {
        if !self.pending.is_empty() {
            debug!("Discarded {} commit hooks on connection reset", self.pending.len());
        }
        self.pending.clear();
        self.run_on_autocommit_restore = false;
    }

    /// Number of hooks waiting for commit.
    pub fn pending_hooks(&self) -> usize {
        self.pending.len()
    }

    /// Whether a commit has happened and its hooks are waiting for the
    /// autocommit-restored confirmation.
    pub fn awaiting_autocommit(&self) -> bool {
        self.run_on_autocommit_restore
    }

    /// Run all pending hooks in registration order and empty the list.
    ///
    /// The batch is taken out of the registry up front, so the pending list
    /// is empty however the hooks behave; even an unwinding hook cannot leak
    /// stale hooks into the next transaction. A failing hook does not stop
    /// the drain. The first failure is returned once every hook has been
    /// attempted; later failures are only logged.
    fn drain(&mut self) -> Result<(), HookError> {
        let hooks = std::mem::take(&mut self.pending);
        if hooks.is_empty() {
            return Ok(());
        }

        debug!("Running {} commit hooks", hooks.len());
        let mut first_error: Option<HookError> = None;

        for (index, hook) in hooks.into_iter().enumerate() {
            let hook_start = Instant::now();
            let result = (hook.action)();
            let execution_time = hook_start.elapsed();

            match result {
                Ok(()) => {
                    if self.config.debug_logging {
                        debug!("Commit hook {} completed in {:?}", index, execution_time);
                    }
                }
                Err(source) => {
                    warn!("Commit hook {} failed in {:?}: {}", index, execution_time, source);
                    if first_error.is_none() {
                        first_error = Some(HookError::Execution { index, source });
                    }
                }
            }

            if self.config.slow_hook_warning
                && execution_time.as_millis() as u64 >= self.config.slow_hook_threshold_ms
            {
                warn!(
                    "Commit hook {} took {:?} (threshold {}ms)",
                    index, execution_time, self.config.slow_hook_threshold_ms
                );
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for CommitHookRegistry {
    fn default() -> Self {
        Self::new()
    }
}
