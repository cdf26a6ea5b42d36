//! # Dispatch Configuration
//!
//! Configuration for the dispatch gateway:
//! - Environment-backed settings (`GROQ_API_KEY` is required at startup)
//! - The static per-resource rate-limit table
//! - Retry, cache, and health-threshold constants

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod constants;
pub mod limits;
pub mod settings;

// Re-export main types
pub use constants::{CacheDefaults, HealthThresholds, RetryDefaults};
pub use limits::{default_rate_limits, RateLimit};
pub use settings::{LogFormat, Settings, SettingsError};
