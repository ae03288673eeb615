//! Configuration loading.
//!
//! Resolves the store connection target and operational defaults from
//! explicit constructor args, then environment variables, then built-in
//! defaults — in that priority order, mirroring how connection targets are
//! normally resolved: explicit, then environment, then a safe default (or,
//! for the connection target itself, a hard error rather than a guess).

use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::issue::Priority;
use crate::store::retry::RetryPolicy;

/// Configuration for the bulk-operation core.
#[derive(Debug, Clone)]
pub struct Config {
    /// Store connection target (URL, credentials, workspace bundled into
    /// one opaque string — the real shape is the adapter's business).
    pub store_url: String,
    pub workspace: String,

    pub default_priority: Priority,
    pub default_issue_limit: usize,

    pub retry_policy: RetryPolicy,
}

impl Config {
    /// Resolve configuration from the environment.
    ///
    /// Priority for the connection target:
    /// 1. `TRACKER_STORE_URL` / `TRACKER_WORKSPACE` environment variables
    /// 2. hard error — this core never guesses a connection target
    ///
    /// Priority for operational defaults:
    /// 1. environment variable
    /// 2. built-in default
    ///
    /// # Errors
    ///
    /// Returns `Config` if `TRACKER_STORE_URL` or `TRACKER_WORKSPACE` is
    /// unset.
    pub fn from_env() -> Result<Self> {
        let store_url = std::env::var("TRACKER_STORE_URL")
            .map_err(|_| Error::Config("TRACKER_STORE_URL is not set".to_string()))?;
        let workspace = std::env::var("TRACKER_WORKSPACE")
            .map_err(|_| Error::Config("TRACKER_WORKSPACE is not set".to_string()))?;

        let default_priority = std::env::var("TRACKER_DEFAULT_PRIORITY")
            .ok()
            .and_then(|v| crate::validate::normalize_priority(&v).ok())
            .unwrap_or(Priority::Medium);

        let default_issue_limit = std::env::var("TRACKER_DEFAULT_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(50);

        Ok(Self {
            store_url,
            workspace,
            default_priority,
            default_issue_limit,
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Build a configuration directly, bypassing environment resolution.
    /// Used by tests and the demo binary.
    #[must_use]
    pub fn new(store_url: impl Into<String>, workspace: impl Into<String>) -> Self {
        Self {
            store_url: store_url.into(),
            workspace: workspace.into(),
            default_priority: Priority::Medium,
            default_issue_limit: 50,
            retry_policy: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_default_priority(mut self, priority: Priority) -> Self {
        self.default_priority = priority;
        self
    }

    #[must_use]
    pub fn connection_timeout() -> Duration {
        Duration::from_secs(30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_has_sane_defaults() {
        let config = Config::new("https://store.example", "eng");
        assert_eq!(config.default_priority, Priority::Medium);
        assert_eq!(config.default_issue_limit, 50);
        assert_eq!(config.retry_policy.max_attempts, 3);
    }

    #[test]
    #[allow(unsafe_code)]
    fn from_env_errors_without_store_url() {
        // SAFETY: test runs on the current thread before any other test
        // in this module touches the same env vars.
        unsafe {
            std::env::remove_var("TRACKER_STORE_URL");
        }
        let result = Config::from_env();
        assert!(result.is_err());
    }
}
