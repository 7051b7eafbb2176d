use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookConfig {
    pub environment: Environment,
    pub slow_hook_warning: bool,
    pub slow_hook_threshold_ms: u64,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl HookConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("TXN_HOOKS_SLOW_HOOK_WARNING") {
            self.slow_hook_warning = v.parse().unwrap_or(self.slow_hook_warning);
        }
        if let Ok(v) = env::var("TXN_HOOKS_SLOW_HOOK_THRESHOLD_MS") {
            self.slow_hook_threshold_ms = v.parse().unwrap_or(self.slow_hook_threshold_ms);
        }
        if let Ok(v) = env::var("TXN_HOOKS_DEBUG_LOGGING") {
            self.debug_logging = v.parse().unwrap_or(self.debug_logging);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            slow_hook_warning: true,
            slow_hook_threshold_ms: 100,
            debug_logging: true,
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            slow_hook_warning: true,
            slow_hook_threshold_ms: 500,
            debug_logging: false,
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            slow_hook_warning: true,
            slow_hook_threshold_ms: 1000,
            debug_logging: false,
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<HookConfig> = Lazy::new(HookConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static HookConfig {
    &CONFIG
}
