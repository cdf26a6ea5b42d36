//! # Dispatch Telemetry
//!
//! Operational visibility for the dispatch gateway:
//! - Structured logging configuration (stderr only; stdout carries protocol frames)
//! - Usage metrics aggregation with health classification and daily rollup

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;
pub mod metrics;

// Re-export main types
pub use logging::{init_logging, LoggingConfig, LoggingError};
pub use metrics::{HealthState, HealthStatus, MetricsTracker, ResponseTimeStats, UsageMetrics};
