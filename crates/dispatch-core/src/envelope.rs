//! The uniform response envelope for tool invocations.
//!
//! Every invocation, successful or failed, returns the same envelope shape:
//! a list of text content blocks and an optional error marker. Callers never
//! see a raw stack trace, only a message string.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Argument fields replaced by a redaction marker before failure logging
const SENSITIVE_FIELDS: [&str; 5] = ["password", "token", "apiKey", "secret", "key"];

/// Marker substituted for sensitive argument values in log records
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// A single content block in a tool result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentBlock {
    /// Block type (always "text")
    #[serde(rename = "type")]
    pub kind: String,
    /// The text payload
    pub text: String,
}

impl ContentBlock {
    /// Create a text content block
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
        }
    }
}

/// Result envelope returned to the caller for every tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    /// Content blocks
    pub content: Vec<ContentBlock>,
    /// Error marker, present and true only for failures
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    /// Create a success envelope from a tool result value
    #[must_use]
    pub fn success(result: &Value) -> Self {
        Self {
            content: vec![ContentBlock::text(format_result(result))],
            is_error: None,
        }
    }

    /// Create an error envelope with a human-readable message
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(message)],
            is_error: Some(true),
        }
    }

    /// Check whether this envelope marks a failure
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// Get the first content block's text (convenience accessor)
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.content.first().map(|c| c.text.as_str())
    }
}

/// Render a tool result value as envelope text.
///
/// Strings pass through verbatim; null renders as an explicit no-result
/// marker; everything else is pretty-printed JSON.
#[must_use]
pub fn format_result(result: &Value) -> String {
    match result {
        Value::String(s) => s.clone(),
        Value::Null => "No result returned".to_string(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Replace sensitive fields in an argument object with a redaction marker.
///
/// Only top-level fields are inspected, matching the set the failure logger
/// scrubs. Non-object values pass through unchanged.
#[must_use]
pub fn sanitize_args(args: &Value) -> Value {
    match args {
        Value::Object(map) => {
            let mut sanitized = map.clone();
            for field in SENSITIVE_FIELDS {
                if sanitized.contains_key(field) {
                    sanitized.insert(field.to_string(), Value::String(REDACTION_MARKER.into()));
                }
            }
            Value::Object(sanitized)
        }
        other => other.clone(),
    }
}

/// Tool metadata returned by the list-tools query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Unique tool name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON-Schema-shaped input description
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Response for the list-tools query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsListing {
    /// Registered tools
    pub tools: Vec<ToolInfo>,
}
