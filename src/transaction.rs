// Scoped transaction execution in the style of sqlx's Connection::transaction

use futures::future::BoxFuture;
use tracing::warn;

use crate::connection::{Connection, TxError};
use crate::driver::Driver;

/// Options for [`atomic_with`].
#[derive(Debug, Clone, Copy)]
pub struct AtomicOptions {
    /// Whether a nested scope gets its own savepoint. Without one a failed
    /// scope poisons the whole transaction (rollback-only), because its work
    /// cannot be unwound separately.
    pub savepoint: bool,
}

impl Default for AtomicOptions {
    fn default() -> Self {
        Self { savepoint: true }
    }
}

/// Run `scope` inside a transaction on `conn`.
///
/// Opens a transaction (or a savepoint when one is already open), commits on
/// `Ok` and rolls back on `Err`. The outermost exit also restores driver
/// autocommit, which is the moment deferred commit hooks run on drivers that
/// delay restoration; a hook that opens its own transaction may not be
/// supported there (see [`Connection::on_commit`]). Hook failures from the
/// drain surface in the returned error after every hook has been attempted.
pub async fn atomic<D, F, T, E>(conn: &mut Connection<D>, scope: F) -> Result<T, E>
where
    D: Driver,
    for<'c> F: FnOnce(&'c mut Connection<D>) -> BoxFuture<'c, Result<T, E>> + Send,
    T: Send,
    E: From<TxError> + Send,
{
    atomic_with(conn, AtomicOptions::default(), scope).await
}

/// [`atomic`] with explicit options.
pub async fn atomic_with<D, F, T, E>(
    conn: &mut Connection<D>,
    options: AtomicOptions,
    scope: F,
) -> Result<T, E>
where
    D: Driver,
    for<'c> F: FnOnce(&'c mut Connection<D>) -> BoxFuture<'c, Result<T, E>> + Send,
    T: Send,
    E: From<TxError> + Send,
{
    let outermost = !conn.in_transaction();

    let savepoint = if outermost {
        conn.begin().await.map_err(E::from)?;
        None
    } else if options.savepoint {
        Some(conn.savepoint().await.map_err(E::from)?)
    } else {
        None
    };

    // The scope future borrows conn; it must be dropped before the
    // commit/rollback calls below can touch the connection again.
    let result = scope(&mut *conn).await;

    match result {
        Ok(value) => {
            if let Some(sid) = savepoint {
                conn.release_savepoint(sid).await.map_err(E::from)?;
            } else if outermost {
                commit_and_restore(conn).await.map_err(E::from)?;
            }
            Ok(value)
        }
        Err(error) => {
            if let Some(sid) = savepoint {
                if let Err(rollback_error) = conn.rollback_to_savepoint(sid).await {
                    warn!("Savepoint rollback after scope error failed: {}", rollback_error);
                }
            } else if outermost {
                if let Err(rollback_error) = conn.rollback().await {
                    warn!("Rollback after scope error failed: {}", rollback_error);
                }
                if let Err(restore_error) = conn.set_autocommit(true).await {
                    warn!("Autocommit restore after rollback failed: {}", restore_error);
                }
            } else {
                // Merged scope: its work cannot be unwound on its own, so
                // the enclosing transaction must not commit either.
                conn.mark_rollback_only().map_err(E::from)?;
            }
            Err(error)
        }
    }
}

/// Commit the outermost transaction, then restore autocommit. Restoration
/// runs even when the commit (or its hook drain) failed, so the session
/// never stays wedged in manual-commit mode; the commit error wins.
async fn commit_and_restore<D: Driver>(conn: &mut Connection<D>) -> Result<(), TxError> {
    let commit_result = conn.commit().await;
    let restore_result = conn.set_autocommit(true).await;
    commit_result?;
    restore_result
}
