//! Tuning constants for retries, caching, and health classification.

use std::time::Duration;

/// Retry tuning defaults
#[derive(Debug, Clone, Copy)]
pub struct RetryDefaults;

impl RetryDefaults {
    /// Maximum attempts per operation
    pub const MAX_ATTEMPTS: u32 = 3;
    /// Delay before the first retry
    pub const INITIAL_DELAY: Duration = Duration::from_millis(100);
    /// Upper bound on any single delay
    pub const MAX_DELAY: Duration = Duration::from_secs(10);
    /// Multiplier applied to the delay after each failed attempt
    pub const BACKOFF_FACTOR: f64 = 2.0;
}

/// Cache tuning defaults
#[derive(Debug, Clone, Copy)]
pub struct CacheDefaults;

impl CacheDefaults {
    /// TTL applied to cached completion results
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
    /// Entry bound used when bounded eviction is enabled
    pub const MAX_ENTRIES: usize = 1000;
}

/// Health classification thresholds
#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds;

impl HealthThresholds {
    /// Error rate above which status is critical
    pub const CRITICAL_ERROR_RATE: f64 = 0.10;
    /// Error rate above which status is warning
    pub const WARNING_ERROR_RATE: f64 = 0.05;
    /// Average response time (ms) above which status is critical
    pub const CRITICAL_RESPONSE_TIME_MS: f64 = 5000.0;
    /// Average response time (ms) above which status is warning
    pub const WARNING_RESPONSE_TIME_MS: f64 = 2000.0;
}

/// Interval between periodic metrics snapshot logs
pub const METRICS_LOG_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Grace period allowed for in-flight work during graceful shutdown
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Connect/response timeout for upstream API calls
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);
