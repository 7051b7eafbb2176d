// Driver abstraction between transaction management and the SQL client

use async_trait::async_trait;
use thiserror::Error;

pub mod postgres;

// Re-export core types
pub use postgres::PgDriver;

/// Errors from driver implementations
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Statement failed: {0}")]
    Statement(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Driver capabilities that change how commit hooks are scheduled.
#[derive(Debug, Clone, Copy)]
pub struct DriverFeatures {
    /// Whether the session is already back in autocommit mode by the time
    /// COMMIT returns. Drivers that track autocommit client-side and restore
    /// it in a separate step report `false`, which makes the connection hold
    /// commit hooks until `set_autocommit(true)` arrives.
    pub autocommit_restored_immediately: bool,
}

/// The underlying SQL client, reduced to what transaction management needs.
///
/// Implementations transport statements and toggle autocommit; all
/// transaction and savepoint bookkeeping lives in
/// [`Connection`](crate::connection::Connection).
#[async_trait]
pub trait Driver: Send {
    /// Capability flags for this driver.
    fn features(&self) -> DriverFeatures;

    /// Execute a transaction-control statement (BEGIN, COMMIT, SAVEPOINT ...).
    async fn execute(&mut self, sql: &str) -> Result<(), DriverError>;

    /// Toggle the driver-level autocommit flag.
    async fn set_autocommit(&mut self, enabled: bool) -> Result<(), DriverError>;

    /// Tear down the current session and establish a fresh one.
    async fn reset(&mut self) -> Result<(), DriverError>;

    /// Tear down the session for good.
    async fn close(&mut self) -> Result<(), DriverError>;
}
