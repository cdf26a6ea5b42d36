//! Error types and handling for the dispatch gateway.
//!
//! This module provides the error hierarchy for tool invocations, with
//! retryability classification and stable error-type strings for clients.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using `DispatchError`
pub type DispatchResult<T> = Result<T, DispatchError>;

/// HTTP status codes from the upstream API that are worth retrying
pub const RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Upstream error codes that are worth retrying
pub const RETRYABLE_ERROR_CODES: [&str; 4] = [
    "rate_limit_exceeded",
    "server_error",
    "timeout",
    "connection_error",
];

/// Gateway error type covering every invocation failure mode
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Request arguments failed validation
    #[error("Validation error: {message}")]
    Validation {
        /// Error message
        message: String,
        /// Field that failed validation (if applicable)
        field: Option<String>,
    },

    /// Rate limit exceeded for a resource key
    #[error("Rate limit exceeded. Retry in {} seconds.", retry_after.as_secs())]
    RateLimit {
        /// Duration to wait before retrying
        retry_after: Duration,
    },

    /// The upstream API returned an error
    #[error("Upstream error: {message}")]
    Upstream {
        /// Error message
        message: String,
        /// HTTP status code from the upstream (if applicable)
        status_code: Option<u16>,
        /// Upstream error code (if applicable)
        code: Option<String>,
    },

    /// Tool name not present in the registry
    #[error("Unknown tool: {name}")]
    UnknownTool {
        /// The tool name that was requested
        name: String,
    },

    /// The server is draining and rejects new invocations
    #[error("Server is shutting down")]
    ShuttingDown,

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl DispatchError {
    /// Check if this error is retryable
    ///
    /// Upstream errors are retryable when their HTTP status or error code is
    /// in the retryable sets; rate limits and shutdown are transient.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Upstream {
                status_code, code, ..
            } => {
                status_code.is_some_and(|s| RETRYABLE_STATUS_CODES.contains(&s))
                    || code
                        .as_deref()
                        .is_some_and(|c| RETRYABLE_ERROR_CODES.contains(&c))
            }
            Self::RateLimit { .. } | Self::ShuttingDown => true,
            _ => false,
        }
    }

    /// Get the error type string for client responses
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::RateLimit { .. } => "rate_limit_error",
            Self::Upstream { .. } => "upstream_error",
            Self::UnknownTool { .. } => "unknown_tool",
            Self::ShuttingDown => "shutting_down",
            Self::Configuration { .. } => "configuration_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Get the retry-after hint, if this error carries one
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Create a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>, field: Option<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field,
        }
    }

    /// Create a rate limit error
    #[must_use]
    pub fn rate_limit(retry_after: Duration) -> Self {
        Self::RateLimit { retry_after }
    }

    /// Create an upstream error
    #[must_use]
    pub fn upstream(
        message: impl Into<String>,
        status_code: Option<u16>,
        code: Option<String>,
    ) -> Self {
        Self::Upstream {
            message: message.into(),
            status_code,
            code,
        }
    }

    /// Create an unknown tool error
    #[must_use]
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation {
            message: err.to_string(),
            field: None,
        }
    }
}

impl From<std::io::Error> for DispatchError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryability() {
        assert!(!DispatchError::validation("bad input", None).is_retryable());
        assert!(!DispatchError::unknown_tool("nope").is_retryable());
        assert!(DispatchError::rate_limit(Duration::from_secs(5)).is_retryable());
        assert!(DispatchError::ShuttingDown.is_retryable());

        assert!(DispatchError::upstream("overloaded", Some(503), None).is_retryable());
        assert!(DispatchError::upstream("throttled", Some(429), None).is_retryable());
        assert!(!DispatchError::upstream("bad request", Some(400), None).is_retryable());
        assert!(DispatchError::upstream(
            "timed out",
            None,
            Some("timeout".to_string())
        )
        .is_retryable());
        assert!(!DispatchError::upstream(
            "invalid key",
            None,
            Some("invalid_api_key".to_string())
        )
        .is_retryable());
    }

    #[test]
    fn test_error_type_strings() {
        assert_eq!(
            DispatchError::validation("x", None).error_type(),
            "validation_error"
        );
        assert_eq!(
            DispatchError::rate_limit(Duration::from_secs(1)).error_type(),
            "rate_limit_error"
        );
        assert_eq!(
            DispatchError::unknown_tool("x").error_type(),
            "unknown_tool"
        );
        assert_eq!(DispatchError::ShuttingDown.error_type(), "shutting_down");
    }

    #[test]
    fn test_rate_limit_message_carries_seconds() {
        let err = DispatchError::rate_limit(Duration::from_secs(17));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(17)));
        assert!(err.to_string().contains("17 seconds"));
    }
}
