//! Dual-dimension rate limiting with fixed windows.
//!
//! Each configured resource key gets two independent fixed 60s windows: one
//! counting requests (capacity = rpm) and one counting tokens (capacity =
//! tpm). A window that has passed its end resets to full capacity before
//! consuming. Unknown resource keys are treated as unlimited.
//!
//! The two-step consume (request window, then token window) is not
//! transactional: a token-window rejection does not roll back the request
//! point already consumed. The failure carries a retry-after hint and the
//! caller must not retry before it elapses.

use dispatch_config::RateLimit;
use dispatch_core::DispatchError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Window duration for both dimensions
    pub window: Duration,
    /// Whether a zero-capacity token window rejects non-zero costs.
    ///
    /// Off by default: resources configured with `tokens_per_minute = 0`
    /// (audio, TTS, batch) skip token enforcement entirely.
    pub enforce_zero_capacity: bool,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            enforce_zero_capacity: false,
        }
    }
}

/// A fixed consumption window for one dimension
#[derive(Debug, Clone)]
struct FixedWindow {
    capacity: u32,
    consumed: u64,
    resets_at: Instant,
    window: Duration,
}

impl FixedWindow {
    fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity,
            consumed: 0,
            resets_at: Instant::now() + window,
            window,
        }
    }

    /// Consume `cost` points, resetting first if the window has passed.
    ///
    /// On rejection returns the time until this window resets.
    fn try_consume(&mut self, cost: u64) -> Result<(), Duration> {
        let now = Instant::now();
        if now >= self.resets_at {
            self.consumed = 0;
            self.resets_at = now + self.window;
        }

        if self.consumed + cost > u64::from(self.capacity) {
            return Err(self.resets_at.saturating_duration_since(now));
        }

        self.consumed += cost;
        Ok(())
    }

    fn remaining(&self) -> u64 {
        if Instant::now() >= self.resets_at {
            u64::from(self.capacity)
        } else {
            u64::from(self.capacity).saturating_sub(self.consumed)
        }
    }
}

/// Per-key window pair: requests and tokens
#[derive(Debug, Clone)]
struct WindowPair {
    requests: FixedWindow,
    tokens: FixedWindow,
}

/// Remaining budget for a resource key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingPoints {
    /// Request points left in the current window
    pub requests: u64,
    /// Token points left in the current window
    pub tokens: u64,
}

/// Dual-dimension rate limiter over a static resource table
pub struct RateLimiter {
    config: RateLimiterConfig,
    windows: Arc<RwLock<HashMap<String, WindowPair>>>,
}

impl RateLimiter {
    /// Create a limiter with one window pair per configured resource key
    #[must_use]
    pub fn new(limits: &HashMap<String, RateLimit>, config: RateLimiterConfig) -> Self {
        let windows = limits
            .iter()
            .map(|(key, limit)| {
                (
                    key.clone(),
                    WindowPair {
                        requests: FixedWindow::new(limit.requests_per_minute, config.window),
                        tokens: FixedWindow::new(limit.tokens_per_minute, config.window),
                    },
                )
            })
            .collect::<HashMap<_, _>>();

        info!(resources = windows.len(), "Initialized rate limiters");

        Self {
            config,
            windows: Arc::new(RwLock::new(windows)),
        }
    }

    /// Create a limiter over the default rate-limit table
    #[must_use]
    pub fn with_defaults(limits: &HashMap<String, RateLimit>) -> Self {
        Self::new(limits, RateLimiterConfig::default())
    }

    /// Check and consume budget for one invocation.
    ///
    /// Consumes 1 point from the request window, then `token_cost` points
    /// from the token window. Unknown resource keys succeed with a warning.
    ///
    /// # Errors
    /// Returns `DispatchError::RateLimit` with a retry-after hint (rounded up,
    /// minimum 1s) when either dimension is exhausted.
    pub async fn check_limit(&self, key: &str, token_cost: u64) -> Result<(), DispatchError> {
        let mut windows = self.windows.write().await;

        let Some(pair) = windows.get_mut(key) else {
            warn!(key, "No rate limiter configured for key");
            return Ok(());
        };

        if let Err(until_reset) = pair.requests.try_consume(1) {
            let retry_after = round_up_seconds(until_reset);
            warn!(
                key,
                retry_after_secs = retry_after.as_secs(),
                "Request rate limit exceeded"
            );
            return Err(DispatchError::rate_limit(retry_after));
        }

        // Zero-capacity token windows are unenforced unless explicitly
        // configured otherwise; the request point above stays consumed.
        let token_enforced = pair.tokens.capacity > 0 || self.config.enforce_zero_capacity;
        if token_cost > 0 && token_enforced {
            if let Err(until_reset) = pair.tokens.try_consume(token_cost) {
                let retry_after = round_up_seconds(until_reset);
                warn!(
                    key,
                    token_cost,
                    retry_after_secs = retry_after.as_secs(),
                    "Token rate limit exceeded"
                );
                return Err(DispatchError::rate_limit(retry_after));
            }
        }

        debug!(
            key,
            requests_remaining = pair.requests.remaining(),
            tokens_remaining = pair.tokens.remaining(),
            "Rate limit check passed"
        );

        Ok(())
    }

    /// Get the remaining budget for a resource key, if configured
    pub async fn remaining_points(&self, key: &str) -> Option<RemainingPoints> {
        let windows = self.windows.read().await;
        windows.get(key).map(|pair| RemainingPoints {
            requests: pair.requests.remaining(),
            tokens: pair.tokens.remaining(),
        })
    }

    /// Number of configured resource keys
    pub async fn key_count(&self) -> usize {
        self.windows.read().await.len()
    }
}

/// Round a duration up to whole seconds with a 1s floor
fn round_up_seconds(duration: Duration) -> Duration {
    let secs = duration.as_secs_f64().ceil() as u64;
    Duration::from_secs(secs.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, u32, u32)]) -> HashMap<String, RateLimit> {
        entries
            .iter()
            .map(|(k, rpm, tpm)| ((*k).to_string(), RateLimit::new(*rpm, *tpm)))
            .collect()
    }

    fn limiter_with_window(
        entries: &[(&str, u32, u32)],
        window: Duration,
    ) -> RateLimiter {
        RateLimiter::new(
            &table(entries),
            RateLimiterConfig {
                window,
                enforce_zero_capacity: false,
            },
        )
    }

    #[tokio::test]
    async fn test_allows_exactly_rpm_requests() {
        let limiter = RateLimiter::with_defaults(&table(&[("model-a", 5, 1000)]));

        for i in 0..5 {
            assert!(
                limiter.check_limit("model-a", 1).await.is_ok(),
                "request {i} should be admitted"
            );
        }

        let err = limiter.check_limit("model-a", 1).await.unwrap_err();
        let retry_after = err.retry_after().expect("retry-after hint");
        assert!(retry_after >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_window_resets_after_retry_after() {
        let limiter = limiter_with_window(&[("model-a", 2, 0)], Duration::from_millis(80));

        limiter.check_limit("model-a", 0).await.unwrap();
        limiter.check_limit("model-a", 0).await.unwrap();
        assert!(limiter.check_limit("model-a", 0).await.is_err());

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(limiter.check_limit("model-a", 0).await.is_ok());
    }

    #[tokio::test]
    async fn test_token_dimension_enforced() {
        let limiter = RateLimiter::with_defaults(&table(&[("model-a", 100, 1000)]));

        assert!(limiter.check_limit("model-a", 500).await.is_ok());
        assert!(limiter.check_limit("model-a", 400).await.is_ok());
        // only 100 token points left
        assert!(limiter.check_limit("model-a", 200).await.is_err());
    }

    #[tokio::test]
    async fn test_request_point_not_rolled_back_on_token_rejection() {
        let limiter = RateLimiter::with_defaults(&table(&[("model-a", 3, 100)]));

        assert!(limiter.check_limit("model-a", 200).await.is_err());

        let remaining = limiter.remaining_points("model-a").await.unwrap();
        assert_eq!(remaining.requests, 2);
        assert_eq!(remaining.tokens, 100);
    }

    #[tokio::test]
    async fn test_unknown_key_is_unlimited() {
        let limiter = RateLimiter::with_defaults(&table(&[("model-a", 1, 0)]));

        for _ in 0..50 {
            assert!(limiter.check_limit("not-configured", 1).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_zero_capacity_token_window_unenforced_by_default() {
        let limiter = RateLimiter::with_defaults(&table(&[("whisper-large-v3", 20, 0)]));

        // arbitrary token cost is admitted when the token dimension is unenforced
        assert!(limiter.check_limit("whisper-large-v3", 5000).await.is_ok());
    }

    #[tokio::test]
    async fn test_zero_capacity_token_window_enforced_when_flagged() {
        let limiter = RateLimiter::new(
            &table(&[("whisper-large-v3", 20, 0)]),
            RateLimiterConfig {
                window: Duration::from_secs(60),
                enforce_zero_capacity: true,
            },
        );

        assert!(limiter.check_limit("whisper-large-v3", 1).await.is_err());
        // zero-cost calls still pass
        assert!(limiter.check_limit("whisper-large-v3", 0).await.is_ok());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::with_defaults(&table(&[("a", 2, 0), ("b", 2, 0)]));

        limiter.check_limit("a", 0).await.unwrap();
        limiter.check_limit("a", 0).await.unwrap();
        assert!(limiter.check_limit("a", 0).await.is_err());

        assert!(limiter.check_limit("b", 0).await.is_ok());
    }

    #[tokio::test]
    async fn test_remaining_points() {
        let limiter = RateLimiter::with_defaults(&table(&[("model-a", 10, 1000)]));

        limiter.check_limit("model-a", 100).await.unwrap();

        let remaining = limiter.remaining_points("model-a").await.unwrap();
        assert_eq!(remaining.requests, 9);
        assert_eq!(remaining.tokens, 900);

        assert!(limiter.remaining_points("unknown").await.is_none());
    }

    #[test]
    fn test_round_up_seconds_floor() {
        assert_eq!(round_up_seconds(Duration::from_millis(1)), Duration::from_secs(1));
        assert_eq!(round_up_seconds(Duration::from_millis(1500)), Duration::from_secs(2));
        assert_eq!(round_up_seconds(Duration::ZERO), Duration::from_secs(1));
    }
}
