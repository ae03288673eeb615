//! Exponential backoff for connection-class Store Adapter failures.
//!
//! Connection-class failures (`ConnectionLost`, `Timeout`) are retried
//! inside the adapter; every other error surfaces immediately. Non-adapter
//! code never retries.

use std::future::Future;
use std::time::Duration;

use crate::error::Error;

/// Retry policy, loaded from [`crate::config::Config`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: u32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2,
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Delay before the `attempt`-th retry (0-indexed), capped at `max_delay`.
#[must_use]
pub fn exponential_backoff(attempt: u32, policy: &RetryPolicy) -> Duration {
    let multiplier = policy.backoff_factor.saturating_pow(attempt);
    let delay = policy.initial_delay.saturating_mul(multiplier);
    delay.min(policy.max_delay)
}

/// Run `op` with exponential backoff, retrying only on connection-class
/// errors (`ConnectionLost`, `Timeout`) up to `policy.max_attempts` times.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_connection_class(&err) && attempt + 1 < policy.max_attempts => {
                let delay = exponential_backoff(attempt, policy);
                tracing::warn!(attempt, ?delay, error = %err, "retrying after connection-class failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn is_connection_class(err: &Error) -> bool {
    matches!(err, Error::ConnectionLost { .. } | Error::Timeout { .. })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(exponential_backoff(0, &policy), Duration::from_secs(1));
        assert_eq!(exponential_backoff(1, &policy), Duration::from_secs(2));
        assert_eq!(exponential_backoff(2, &policy), Duration::from_secs(4));
        assert_eq!(exponential_backoff(10, &policy), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn retries_connection_errors_until_success() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            ..RetryPolicy::default()
        };
        let mut calls = 0;
        let result: Result<i32, Error> = with_retry(&policy, || {
            calls += 1;
            let attempt = calls;
            async move {
                if attempt < 3 {
                    Err(Error::connection("simulated"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn does_not_retry_validation_errors() {
        let policy = RetryPolicy::default();
        let mut calls = 0;
        let result: Result<i32, Error> = with_retry(&policy, || {
            calls += 1;
            async { Err(Error::validation("bad input")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
