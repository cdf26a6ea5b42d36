//! Environment-backed settings.
//!
//! One variable is required: `GROQ_API_KEY`. Its absence is a fatal startup
//! condition surfaced before any core component initializes. Everything else
//! is optional with sensible defaults.

use dispatch_core::ApiKey;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

/// Settings loading errors
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A required environment variable is missing
    #[error("Required environment variable not set: {name}")]
    MissingRequired {
        /// The variable name
        name: String,
    },

    /// A variable is present but invalid
    #[error("Invalid value for {name}: {reason}")]
    Invalid {
        /// The variable name
        name: String,
        /// Why the value was rejected
        reason: String,
    },
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON format (structured)
    Json,
    /// Pretty format (human-readable)
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Runtime settings resolved from the environment
#[derive(Debug, Clone)]
pub struct Settings {
    /// Upstream API credential (required)
    pub api_key: ApiKey,
    /// Log verbosity (trace/debug/info/warn/error)
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Whether the completion cache is enabled
    pub cache_enabled: bool,
    /// Optional metrics export target
    pub metrics_endpoint: Option<String>,
    /// Directory for temporary files
    pub temp_dir: PathBuf,
    /// Allowed origins for inbound requests
    pub allowed_origins: Vec<String>,
}

impl Settings {
    /// Load settings from the process environment
    ///
    /// # Errors
    /// Returns `SettingsError::MissingRequired` if `GROQ_API_KEY` is absent.
    /// Callers must treat this as fatal and exit before initializing anything
    /// else.
    pub fn from_env() -> Result<Self, SettingsError> {
        let api_key = std::env::var("GROQ_API_KEY")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| SettingsError::MissingRequired {
                name: "GROQ_API_KEY".to_string(),
            })
            .and_then(|v| {
                ApiKey::new(v).map_err(|e| SettingsError::Invalid {
                    name: "GROQ_API_KEY".to_string(),
                    reason: e.to_string(),
                })
            })?;

        let log_format = match std::env::var("LOG_FORMAT") {
            Ok(v) => v.parse().unwrap_or_else(|reason: String| {
                warn!(reason = %reason, "Falling back to pretty log format");
                LogFormat::Pretty
            }),
            Err(_) => LogFormat::Pretty,
        };

        Ok(Self {
            api_key,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
            cache_enabled: env_flag("CACHE_ENABLED", true),
            metrics_endpoint: std::env::var("METRICS_ENDPOINT").ok().filter(|v| !v.is_empty()),
            temp_dir: std::env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp")),
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
        })
    }

    /// Construct settings directly (used by tests and embedding callers)
    #[must_use]
    pub fn with_api_key(api_key: ApiKey) -> Self {
        Self {
            api_key,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            cache_enabled: true,
            metrics_endpoint: None,
            temp_dir: PathBuf::from("/tmp"),
            allowed_origins: vec!["*".to_string()],
        }
    }

    /// Disable the completion cache
    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.cache_enabled = false;
        self
    }
}

/// Parse a boolean environment flag, defaulting when absent or unparseable
fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_settings_builder_defaults() {
        let settings = Settings::with_api_key(ApiKey::new("gsk-test").unwrap());
        assert!(settings.cache_enabled);
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.temp_dir, PathBuf::from("/tmp"));
        assert_eq!(settings.allowed_origins, vec!["*".to_string()]);

        let settings = settings.without_cache();
        assert!(!settings.cache_enabled);
    }

    #[test]
    fn test_missing_key_is_fatal() {
        // from_env reads the real environment; run the check in a scope that
        // guarantees the variable is unset for this process.
        std::env::remove_var("GROQ_API_KEY");
        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, SettingsError::MissingRequired { ref name } if name == "GROQ_API_KEY"));
    }
}
