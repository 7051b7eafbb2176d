//! Deferred commit hooks for SQL connections.
//!
//! A [`Connection`] wraps a [`Driver`] and keeps a registry of zero-argument
//! actions registered through [`Connection::on_commit`]. Actions registered
//! inside a transaction run exactly once, in registration order, after the
//! outermost commit; rolling back the transaction (or a savepoint that was
//! active at registration) discards them. Outside a transaction they run
//! inline.
//!
//! ```rust,no_run
//! use txn_hooks::{atomic, Connection, PgDriver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let driver = PgDriver::from_env().await?;
//! let mut conn = Connection::new(driver);
//!
//! atomic(&mut conn, |conn| {
//!     Box::pin(async move {
//!         conn.on_commit(|| {
//!             println!("transaction landed");
//!             Ok(())
//!         })?;
//!         Ok::<_, txn_hooks::TxError>(())
//!     })
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod driver;
pub mod hooks;
pub mod transaction;

#[cfg(test)]
pub mod testing;

// Re-export core types
pub use connection::{Connection, TxError, TxnPhase};
pub use driver::{Driver, DriverError, DriverFeatures, PgDriver};
pub use hooks::{BoxDynError, CommitHookRegistry, HookError, HookFn, HookResult, SavepointId};
pub use transaction::{atomic, atomic_with, AtomicOptions};
