//! Retry policy with exponential backoff.
//!
//! Wraps a fallible async operation with a bounded attempt budget. The policy
//! retries unconditionally up to the budget; distinguishing retryable from
//! fatal failures (`DispatchError::is_retryable`) is left to callers that
//! want to stop early, at the cost of a few wasted attempts on fatal errors.

use dispatch_config::RetryDefaults;
use dispatch_core::DispatchError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum attempts (including the first)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt
    pub backoff_factor: f64,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: RetryDefaults::MAX_ATTEMPTS,
            initial_delay: RetryDefaults::INITIAL_DELAY,
            backoff_factor: RetryDefaults::BACKOFF_FACTOR,
            max_delay: RetryDefaults::MAX_DELAY,
        }
    }
}

/// Retry policy for upstream operations
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a new retry policy
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Maximum attempts this policy will make
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Execute an operation, retrying on failure with escalating backoff.
    ///
    /// Returns the first success, or the last observed error once the
    /// attempt budget is exhausted. Every failed attempt is logged at WARN
    /// with its attempt number.
    ///
    /// # Errors
    /// Returns the operation's last error after `max_attempts` failures.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, DispatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DispatchError>>,
    {
        let mut delay = self.config.initial_delay;
        let mut last_error = None;

        for attempt in 1..=self.config.max_attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(attempt, error = %err, "Retry attempt failed");
                    last_error = Some(err);

                    if attempt < self.config.max_attempts {
                        tokio::time::sleep(delay).await;
                        delay = self.next_delay(delay);
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| DispatchError::internal("retry budget was zero attempts")))
    }

    /// Escalate the delay by the backoff factor, capped at the maximum
    fn next_delay(&self, current: Duration) -> Duration {
        let escalated = current.mul_f64(self.config.backoff_factor);
        escalated.min(self.config.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_millis(10),
        })
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let policy = fast_policy(3);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let result = policy
            .execute(move || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(DispatchError::upstream("flaky", Some(503), None))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let policy = fast_policy(3);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let result: Result<(), _> = policy
            .execute(move || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Err(DispatchError::upstream(
                        format!("failure {n}"),
                        Some(500),
                        None,
                    ))
                }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("failure 3"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_first_attempt_success_does_not_retry() {
        let policy = fast_policy(3);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let result = policy
            .execute(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok("ok")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_escalates_to_cap() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
            max_delay: Duration::from_millis(300),
        });

        let d1 = policy.next_delay(Duration::from_millis(100));
        assert_eq!(d1, Duration::from_millis(200));

        let d2 = policy.next_delay(d1);
        assert_eq!(d2, Duration::from_millis(300));

        // capped
        let d3 = policy.next_delay(d2);
        assert_eq!(d3, Duration::from_millis(300));
    }
}
