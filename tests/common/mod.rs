#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use txn_hooks::{Connection, Driver, DriverError, DriverFeatures, HookError};

/// Initialise tracing for a test binary; repeat calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// In-process driver that records every statement, so scenario tests can
/// assert on the exact transaction-control sequence a workflow produced.
pub struct RecordingDriver {
    statements: Vec<String>,
    autocommit_log: Vec<bool>,
    features: DriverFeatures,
    fail_next: Option<String>,
}

impl RecordingDriver {
    /// Postgres-like behaviour: autocommit is back as soon as COMMIT returns.
    pub fn new() -> Self {
        Self::with_features(DriverFeatures {
            autocommit_restored_immediately: true,
        })
    }

    /// Driver that restores autocommit in a separate step after COMMIT.
    pub fn deferred_autocommit() -> Self {
        Self::with_features(DriverFeatures {
            autocommit_restored_immediately: false,
        })
    }

    pub fn with_features(features: DriverFeatures) -> Self {
        Self {
            statements: Vec::new(),
            autocommit_log: Vec::new(),
            features,
            fail_next: None,
        }
    }

    /// Statements executed so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.statements.clone()
    }

    /// Autocommit toggles observed so far, in order.
    pub fn autocommit_log(&self) -> Vec<bool> {
        self.autocommit_log.clone()
    }

    /// Make the next `execute` call fail with the given message.
    pub fn fail_next(&mut self, message: impl Into<String>) {
        self.fail_next = Some(message.into());
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    fn features(&self) -> DriverFeatures {
        self.features
    }

    async fn execute(&mut self, sql: &str) -> Result<(), DriverError> {
        if let Some(message) = self.fail_next.take() {
            return Err(DriverError::Statement(message));
        }
        self.statements.push(sql.to_string());
        Ok(())
    }

    async fn set_autocommit(&mut self, enabled: bool) -> Result<(), DriverError> {
        self.autocommit_log.push(enabled);
        Ok(())
    }

    async fn reset(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

/// Stand-in for a notify-on-commit workflow: each unit of work registers a
/// hook that reports its id once the surrounding transaction lands, and the
/// test asserts which notifications actually fired. Clones share the log.
#[derive(Clone)]
pub struct Tracker {
    notified: Arc<Mutex<Vec<i64>>>,
}

impl Tracker {
    pub fn new() -> Self {
        Self {
            notified: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a hook on `conn` that records `id` when it runs.
    pub fn notify_on_commit<D: Driver>(
        &self,
        conn: &mut Connection<D>,
        id: i64,
    ) -> Result<(), HookError> {
        let notified = Arc::clone(&self.notified);
        conn.on_commit(move || {
            notified.lock().unwrap().push(id);
            Ok(())
        })
    }

    /// Register a hook that records `id` and then fails.
    pub fn notify_then_fail<D: Driver>(
        &self,
        conn: &mut Connection<D>,
        id: i64,
    ) -> Result<(), HookError> {
        let notified = Arc::clone(&self.notified);
        conn.on_commit(move || {
            notified.lock().unwrap().push(id);
            Err(format!("notification {} failed", id).into())
        })
    }

    /// Ids reported so far, in execution order.
    pub fn notified(&self) -> Vec<i64> {
        self.notified.lock().unwrap().clone()
    }
}
