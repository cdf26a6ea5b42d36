//! Server state shared across invocations.
//!
//! All components are explicitly owned here and constructed once at startup;
//! there is no ambient global state, so tests can build as many independent
//! instances as they need.

use dispatch_config::{default_rate_limits, RateLimit, Settings};
use dispatch_core::{DispatchError, UpstreamClient};
use dispatch_resilience::{RateLimiter, RateLimiterConfig, RetryPolicy, TtlCache};
use dispatch_telemetry::MetricsTracker;
use dispatch_tools::{default_registry, GroqClient, ToolRegistry};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    /// Runtime settings
    pub settings: Arc<Settings>,
    /// Frozen tool registry
    pub registry: Arc<ToolRegistry>,
    /// Per-resource rate limiter
    pub limiter: Arc<RateLimiter>,
    /// Completion cache
    pub cache: Arc<TtlCache>,
    /// Usage metrics aggregator
    pub metrics: Arc<MetricsTracker>,
    /// Retry policy for upstream calls
    pub retry_policy: Arc<RetryPolicy>,
    shutdown: Arc<AtomicBool>,
}

impl ServerState {
    /// Create a new state builder
    #[must_use]
    pub fn builder(settings: Settings) -> ServerStateBuilder {
        ServerStateBuilder::new(settings)
    }

    /// Whether the shutdown flag is set
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Set the shutdown flag; new invocations are rejected from here on
    pub fn begin_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        info!("Shutdown flag set, rejecting new invocations");
    }

    /// Teardown: clear the cache and flush/stop the metrics aggregator
    pub async fn cleanup(&self) {
        self.cache.clear().await;
        self.metrics.destroy();
        info!("Cleanup completed");
    }
}

/// Builder for [`ServerState`]
pub struct ServerStateBuilder {
    settings: Settings,
    upstream: Option<Arc<dyn UpstreamClient>>,
    rate_limits: Option<HashMap<String, RateLimit>>,
    limiter_config: RateLimiterConfig,
    retry_policy: Option<RetryPolicy>,
}

impl ServerStateBuilder {
    /// Create a builder from settings
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            upstream: None,
            rate_limits: None,
            limiter_config: RateLimiterConfig::default(),
            retry_policy: None,
        }
    }

    /// Use a specific upstream client (tests substitute a mock here)
    #[must_use]
    pub fn upstream(mut self, client: Arc<dyn UpstreamClient>) -> Self {
        self.upstream = Some(client);
        self
    }

    /// Override the rate-limit table
    #[must_use]
    pub fn rate_limits(mut self, limits: HashMap<String, RateLimit>) -> Self {
        self.rate_limits = Some(limits);
        self
    }

    /// Override the limiter configuration
    #[must_use]
    pub fn limiter_config(mut self, config: RateLimiterConfig) -> Self {
        self.limiter_config = config;
        self
    }

    /// Override the retry policy
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Build the server state.
    ///
    /// # Errors
    /// Returns `DispatchError::Configuration` if the upstream client or the
    /// tool registry cannot be constructed.
    pub fn build(self) -> Result<ServerState, DispatchError> {
        let upstream = match self.upstream {
            Some(client) => client,
            None => Arc::new(GroqClient::new(self.settings.api_key.clone())?),
        };

        let registry = default_registry(upstream)?;
        let limits = self.rate_limits.unwrap_or_else(default_rate_limits);
        let limiter = RateLimiter::new(&limits, self.limiter_config);

        let cache = if self.settings.cache_enabled {
            TtlCache::with_defaults()
        } else {
            TtlCache::disabled()
        };

        info!(
            tools = registry.len(),
            rate_limited_resources = limits.len(),
            cache_enabled = self.settings.cache_enabled,
            metrics_endpoint = ?self.settings.metrics_endpoint,
            "Server state initialized"
        );

        Ok(ServerState {
            settings: Arc::new(self.settings),
            registry: Arc::new(registry),
            limiter: Arc::new(limiter),
            cache: Arc::new(cache),
            metrics: Arc::new(MetricsTracker::new()),
            retry_policy: Arc::new(self.retry_policy.unwrap_or_else(RetryPolicy::with_defaults)),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::ApiKey;

    fn settings() -> Settings {
        Settings::with_api_key(ApiKey::new("gsk-test").unwrap())
    }

    #[tokio::test]
    async fn test_build_with_defaults() {
        let state = ServerState::builder(settings()).build().expect("state");

        assert_eq!(state.registry.len(), 4);
        assert!(!state.is_shutting_down());
        assert!(state.cache.is_enabled());
        state.metrics.destroy();
    }

    #[tokio::test]
    async fn test_cache_disabled_via_settings() {
        let state = ServerState::builder(settings().without_cache())
            .build()
            .expect("state");

        assert!(!state.cache.is_enabled());
        state.metrics.destroy();
    }

    #[tokio::test]
    async fn test_shutdown_flag() {
        let state = ServerState::builder(settings()).build().expect("state");

        state.begin_shutdown();
        assert!(state.is_shutting_down());

        // independent instances don't share the flag
        let other = ServerState::builder(settings()).build().expect("state");
        assert!(!other.is_shutting_down());

        state.metrics.destroy();
        other.metrics.destroy();
    }

    #[tokio::test]
    async fn test_cleanup_destroys_metrics() {
        let state = ServerState::builder(settings()).build().expect("state");

        state.cleanup().await;
        assert!(state.metrics.is_destroyed());
    }
}
