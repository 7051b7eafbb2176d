use async_trait::async_trait;

use crate::driver::{Driver, DriverError, DriverFeatures};

/// In-process driver that records every statement it is asked to run.
///
/// Stands in for a real SQL client in unit tests: transaction tests assert
/// on the recorded statement sequence instead of on database state.
pub struct MockDriver {
    statements: Vec<String>,
    autocommit_log: Vec<bool>,
    features: DriverFeatures,
    fail_next: Option<String>,
    resets: usize,
}

impl MockDriver {
    /// Driver that behaves like Postgres: autocommit is back the moment
    /// COMMIT returns.
    pub fn new() -> Self {
        Self::with_features(DriverFeatures {
            autocommit_restored_immediately: true,
        })
    }

    /// Driver that restores autocommit in a separate step after COMMIT,
    /// which makes the connection hold hooks until `set_autocommit(true)`.
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
            resets: 0,
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

    /// How many times the session was re-established.
    pub fn resets(&self) -> usize {
        self.resets
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for MockDriver {
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
        self.resets += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_statements_in_order() {
        let mut driver = MockDriver::new();
        driver.execute("BEGIN").await.unwrap();
        driver.execute("COMMIT").await.unwrap();

        assert_eq!(driver.statements(), ["BEGIN", "COMMIT"]);
    }

    #[tokio::test]
    async fn test_fail_next_fails_once() {
        let mut driver = MockDriver::new();
        driver.fail_next("boom");

        assert!(matches!(
            driver.execute("BEGIN").await,
            Err(DriverError::Statement(_))
        ));
        assert!(driver.execute("BEGIN").await.is_ok());
    }
}
