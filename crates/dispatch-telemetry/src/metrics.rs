//! Usage metrics aggregation.
//!
//! Process-wide counters for request volume, token usage, latency, cache and
//! rate-limit activity, with a calendar-day rollup and a derived health
//! classification. Two background timers run on the async runtime: a periodic
//! snapshot log (every 5 minutes) and a daily rollover at local midnight.
//! `destroy()` cancels both idempotently and emits a final snapshot; all
//! recording methods become no-ops afterwards.

use chrono::{Days, Local};
use dispatch_config::{constants::METRICS_LOG_INTERVAL, HealthThresholds};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::info;

/// Per-day rollup: category → key → count
pub type DailyBucket = HashMap<String, HashMap<String, u64>>;

/// Cumulative token usage
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TokenUsage {
    /// Input tokens consumed
    pub input: u64,
    /// Output tokens generated
    pub output: u64,
    /// Input + output
    pub total: u64,
}

/// Running response-time statistics
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ResponseTimeStats {
    /// Minimum observed latency in ms (None until the first sample)
    pub min_ms: Option<u64>,
    /// Maximum observed latency in ms
    pub max_ms: u64,
    /// Sum of all observed latencies in ms
    pub total_ms: u64,
    /// Number of samples
    pub count: u64,
    /// Average latency in ms, recomputed as total/count on every update
    pub avg_ms: f64,
}

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheCounters {
    /// Cache hits
    pub hits: u64,
    /// Cache misses
    pub misses: u64,
    /// hits / (hits + misses), 0 when no lookups yet
    pub hit_rate: f64,
}

/// Cumulative usage metrics snapshot
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageMetrics {
    /// Total requests received
    pub total_requests: u64,
    /// Requests that completed successfully
    pub successful_requests: u64,
    /// Requests that failed
    pub failed_requests: u64,
    /// Token usage totals
    pub token_usage: TokenUsage,
    /// Requests per model
    pub model_distribution: HashMap<String, u64>,
    /// Invocations per tool
    pub tool_usage: HashMap<String, u64>,
    /// Failures per error type
    pub errors_by_type: HashMap<String, u64>,
    /// Response-time statistics
    pub response_time_stats: ResponseTimeStats,
    /// Rate-limit rejections per resource key
    pub rate_limit_hits: HashMap<String, u64>,
    /// Cache counters
    pub cache_stats: CacheCounters,
    /// Day-bucketed rollup keyed by local calendar date (YYYY-MM-DD)
    pub daily_stats: HashMap<String, DailyBucket>,
}

/// Health classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Operating normally
    Healthy,
    /// Elevated error rate or latency
    Warning,
    /// Error rate or latency past critical thresholds
    Critical,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Health status with supporting detail
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Overall classification
    pub status: HealthState,
    /// failed / total (0 when no requests yet)
    pub error_rate: f64,
    /// Average response time in ms
    pub avg_response_time_ms: f64,
    /// Cache hit rate
    pub cache_hit_rate: f64,
    /// Total requests observed
    pub total_requests: u64,
    /// Human-readable reasons for a non-healthy status
    pub reasons: Vec<String>,
}

struct TrackerInner {
    metrics: RwLock<UsageMetrics>,
    destroyed: AtomicBool,
    started_at: Mutex<Instant>,
    timers: Mutex<Vec<JoinHandle<()>>>,
}

impl TrackerInner {
    fn log_snapshot(&self, kind: &str) {
        let snapshot = self.metrics.read().clone();
        let uptime_hours =
            self.started_at.lock().elapsed().as_secs_f64() / 3600.0;
        let metrics_json =
            serde_json::to_string(&snapshot).unwrap_or_else(|_| "{}".to_string());

        info!(
            kind,
            uptime_hours,
            metrics = %metrics_json,
            "Metrics report"
        );
    }

    fn log_daily_report(&self) {
        let yesterday = Local::now()
            .date_naive()
            .checked_sub_days(Days::new(1))
            .map(|d| d.format("%Y-%m-%d").to_string());

        let Some(date) = yesterday else { return };

        let metrics = self.metrics.read();
        if let Some(bucket) = metrics.daily_stats.get(&date) {
            let bucket_json =
                serde_json::to_string(bucket).unwrap_or_else(|_| "{}".to_string());
            info!(date = %date, metrics = %bucket_json, "Daily report");
        }
    }
}

/// Process-wide metrics aggregator
pub struct MetricsTracker {
    inner: Arc<TrackerInner>,
}

impl MetricsTracker {
    /// Create a new tracker and start its background timers.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        let tracker = Self {
            inner: Arc::new(TrackerInner {
                metrics: RwLock::new(UsageMetrics::default()),
                destroyed: AtomicBool::new(false),
                started_at: Mutex::new(Instant::now()),
                timers: Mutex::new(Vec::new()),
            }),
        };
        tracker.spawn_timers();
        tracker
    }

    fn spawn_timers(&self) {
        let mut timers = self.inner.timers.lock();

        // Periodic snapshot log
        let inner = Arc::clone(&self.inner);
        timers.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(METRICS_LOG_INTERVAL);
            interval.tick().await; // the first tick fires immediately
            loop {
                interval.tick().await;
                if inner.destroyed.load(Ordering::SeqCst) {
                    break;
                }
                inner.log_snapshot("periodic");
            }
        }));

        // Daily rollover at local midnight
        let inner = Arc::clone(&self.inner);
        timers.push(tokio::spawn(async move {
            loop {
                tokio::time::sleep(duration_until_local_midnight()).await;
                if inner.destroyed.load(Ordering::SeqCst) {
                    break;
                }
                inner.log_daily_report();
            }
        }));
    }

    fn is_active(&self) -> bool {
        !self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Whether `destroy()` has run
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        !self.is_active()
    }

    /// Record a tool invocation (counts toward total requests)
    pub fn increment_tool_usage(&self, tool_name: &str) {
        if !self.is_active() {
            return;
        }

        let mut metrics = self.inner.metrics.write();
        metrics.total_requests += 1;
        *metrics.tool_usage.entry(tool_name.to_string()).or_default() += 1;
        update_daily(&mut metrics.daily_stats, "tool_usage", tool_name, 1);
    }

    /// Record a successful invocation
    pub fn record_success(&self) {
        if !self.is_active() {
            return;
        }

        let mut metrics = self.inner.metrics.write();
        metrics.successful_requests += 1;
        update_daily(&mut metrics.daily_stats, "successful_requests", "total", 1);
    }

    /// Record a failed invocation with its error type
    pub fn record_error(&self, error_type: &str) {
        if !self.is_active() {
            return;
        }

        let mut metrics = self.inner.metrics.write();
        metrics.failed_requests += 1;
        *metrics
            .errors_by_type
            .entry(error_type.to_string())
            .or_default() += 1;
        update_daily(&mut metrics.daily_stats, "failed_requests", "total", 1);
        update_daily(&mut metrics.daily_stats, "errors_by_type", error_type, 1);
    }

    /// Record token usage for a model
    pub fn record_token_usage(&self, input: u64, output: u64, model: &str) {
        if !self.is_active() {
            return;
        }

        let mut metrics = self.inner.metrics.write();
        metrics.token_usage.input += input;
        metrics.token_usage.output += output;
        metrics.token_usage.total += input + output;
        *metrics
            .model_distribution
            .entry(model.to_string())
            .or_default() += 1;

        update_daily(&mut metrics.daily_stats, "token_usage", "input", input);
        update_daily(&mut metrics.daily_stats, "token_usage", "output", output);
        update_daily(&mut metrics.daily_stats, "model_distribution", model, 1);
    }

    /// Record an invocation's response time
    pub fn record_response_time(&self, duration: Duration) {
        if !self.is_active() {
            return;
        }

        let duration_ms = duration.as_millis() as u64;
        let mut metrics = self.inner.metrics.write();
        let stats = &mut metrics.response_time_stats;

        stats.min_ms = Some(stats.min_ms.map_or(duration_ms, |m| m.min(duration_ms)));
        stats.max_ms = stats.max_ms.max(duration_ms);
        stats.total_ms += duration_ms;
        stats.count += 1;
        stats.avg_ms = stats.total_ms as f64 / stats.count as f64;
    }

    /// Record a rate-limit rejection for a resource key
    pub fn record_rate_limit_hit(&self, key: &str) {
        if !self.is_active() {
            return;
        }

        let mut metrics = self.inner.metrics.write();
        *metrics.rate_limit_hits.entry(key.to_string()).or_default() += 1;
        update_daily(&mut metrics.daily_stats, "rate_limit_hits", key, 1);
    }

    /// Record a cache hit
    pub fn record_cache_hit(&self) {
        if !self.is_active() {
            return;
        }

        let mut metrics = self.inner.metrics.write();
        metrics.cache_stats.hits += 1;
        update_cache_hit_rate(&mut metrics.cache_stats);
    }

    /// Record a cache miss
    pub fn record_cache_miss(&self) {
        if !self.is_active() {
            return;
        }

        let mut metrics = self.inner.metrics.write();
        metrics.cache_stats.misses += 1;
        update_cache_hit_rate(&mut metrics.cache_stats);
    }

    /// Get a defensive copy of the current metrics
    #[must_use]
    pub fn metrics(&self) -> UsageMetrics {
        self.inner.metrics.read().clone()
    }

    /// Derive the health classification from current metrics.
    ///
    /// Error-rate and response-time thresholds are evaluated independently;
    /// each contributes its own reason when breached.
    #[must_use]
    pub fn health_status(&self) -> HealthStatus {
        let metrics = self.inner.metrics.read();

        let error_rate = if metrics.total_requests > 0 {
            metrics.failed_requests as f64 / metrics.total_requests as f64
        } else {
            0.0
        };
        let avg_response_time_ms = metrics.response_time_stats.avg_ms;

        let mut reasons = Vec::new();
        let status = if error_rate > HealthThresholds::CRITICAL_ERROR_RATE
            || avg_response_time_ms > HealthThresholds::CRITICAL_RESPONSE_TIME_MS
        {
            if error_rate > HealthThresholds::CRITICAL_ERROR_RATE {
                reasons.push("High error rate".to_string());
            }
            if avg_response_time_ms > HealthThresholds::CRITICAL_RESPONSE_TIME_MS {
                reasons.push("High response time".to_string());
            }
            HealthState::Critical
        } else if error_rate > HealthThresholds::WARNING_ERROR_RATE
            || avg_response_time_ms > HealthThresholds::WARNING_RESPONSE_TIME_MS
        {
            if error_rate > HealthThresholds::WARNING_ERROR_RATE {
                reasons.push("Elevated error rate".to_string());
            }
            if avg_response_time_ms > HealthThresholds::WARNING_RESPONSE_TIME_MS {
                reasons.push("Elevated response time".to_string());
            }
            HealthState::Warning
        } else {
            HealthState::Healthy
        };

        HealthStatus {
            status,
            error_rate,
            avg_response_time_ms,
            cache_hit_rate: metrics.cache_stats.hit_rate,
            total_requests: metrics.total_requests,
            reasons,
        }
    }

    /// Cancel both background timers and emit a final snapshot.
    ///
    /// Idempotent: subsequent calls do nothing. All recording methods are
    /// no-ops after this returns.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        for timer in self.inner.timers.lock().drain(..) {
            timer.abort();
        }

        self.inner.log_snapshot("final");
        info!("Metrics tracker destroyed");
    }

    /// Reinitialize from zero: destroy if needed, reset state, restart timers
    pub fn restart(&self) {
        if self.is_active() {
            self.destroy();
        }

        *self.inner.metrics.write() = UsageMetrics::default();
        *self.inner.started_at.lock() = Instant::now();
        self.inner.destroyed.store(false, Ordering::SeqCst);
        self.spawn_timers();
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MetricsTracker {
    fn drop(&mut self) {
        for timer in self.inner.timers.lock().drain(..) {
            timer.abort();
        }
    }
}

fn update_cache_hit_rate(stats: &mut CacheCounters) {
    let total = stats.hits + stats.misses;
    stats.hit_rate = if total > 0 {
        stats.hits as f64 / total as f64
    } else {
        0.0
    };
}

fn update_daily(
    daily: &mut HashMap<String, DailyBucket>,
    category: &str,
    key: &str,
    value: u64,
) {
    let today = Local::now().format("%Y-%m-%d").to_string();
    let bucket = daily.entry(today).or_default();
    *bucket
        .entry(category.to_string())
        .or_default()
        .entry(key.to_string())
        .or_default() += value;
}

/// Time until the next local midnight
fn duration_until_local_midnight() -> Duration {
    let now = Local::now();
    let fallback = Duration::from_secs(24 * 60 * 60);

    let Some(tomorrow) = now.date_naive().checked_add_days(Days::new(1)) else {
        return fallback;
    };
    let Some(midnight) = tomorrow.and_hms_opt(0, 0, 0) else {
        return fallback;
    };

    (midnight - now.naive_local()).to_std().unwrap_or(fallback)
}
