//! Text completion tool.
//!
//! Generates completions with model auto-selection: an explicit model wins,
//! then the requested priority (speed/quality/cost), then a prompt-complexity
//! heuristic picks between the fast and the capable default models.

use crate::registry::{Admission, ToolOutcome};
use chrono::Utc;
use dispatch_config::CacheDefaults;
use dispatch_core::{
    ChatMessage, ChatRequest, DispatchError, ResponseFormat, UpstreamClient,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, info};

/// Fast default model for low-complexity prompts
const FAST_MODEL: &str = "llama-3.1-8b-instant";
/// Capable default model for high-complexity prompts
const QUALITY_MODEL: &str = "llama-3.3-70b-versatile";
/// Complexity score above which the capable model is selected
const COMPLEXITY_THRESHOLD: f64 = 0.7;

const DEFAULT_MAX_TOKENS: u32 = 1000;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Selection priority for automatic model choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Fastest response
    Speed,
    /// Best output quality
    Quality,
    /// Lowest cost
    Cost,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompletionArgs {
    prompt: String,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    // accepted for schema parity; execution is always non-streaming
    #[allow(dead_code)]
    stream: Option<bool>,
    json_mode: Option<bool>,
    system_prompt: Option<String>,
    priority: Option<Priority>,
}

impl CompletionArgs {
    fn validate(&self) -> Result<(), DispatchError> {
        if self.prompt.is_empty() {
            return Err(DispatchError::validation(
                "Prompt is required",
                Some("prompt".to_string()),
            ));
        }
        if let Some(max_tokens) = self.max_tokens {
            if !(1..=8000).contains(&max_tokens) {
                return Err(DispatchError::validation(
                    "max_tokens must be between 1 and 8000",
                    Some("max_tokens".to_string()),
                ));
            }
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(DispatchError::validation(
                    "temperature must be between 0 and 2",
                    Some("temperature".to_string()),
                ));
            }
        }
        if let Some(top_p) = self.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(DispatchError::validation(
                    "top_p must be between 0 and 1",
                    Some("top_p".to_string()),
                ));
            }
        }
        Ok(())
    }
}

/// Text completion tool
pub struct TextCompletionTool {
    client: Arc<dyn UpstreamClient>,
}

impl TextCompletionTool {
    /// Tool name
    pub const NAME: &'static str = "groq_text_completion";
    /// Tool description
    pub const DESCRIPTION: &'static str =
        "Generate text completions using Groq models with intelligent routing";

    /// Create the tool over an upstream client
    #[must_use]
    pub fn new(client: Arc<dyn UpstreamClient>) -> Self {
        Self { client }
    }

    /// JSON-Schema input description
    #[must_use]
    pub fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {"type": "string", "minLength": 1, "description": "The prompt to complete"},
                "model": {"type": "string", "description": "Explicit model id (overrides automatic selection)"},
                "max_tokens": {"type": "number", "minimum": 1, "maximum": 8000},
                "temperature": {"type": "number", "minimum": 0, "maximum": 2},
                "top_p": {"type": "number", "minimum": 0, "maximum": 1},
                "stream": {"type": "boolean"},
                "json_mode": {"type": "boolean", "description": "Force a JSON object response"},
                "system_prompt": {"type": "string"},
                "priority": {"type": "string", "enum": ["speed", "quality", "cost"]}
            },
            "required": ["prompt"]
        })
    }

    /// Validate arguments and compute the admission descriptor
    ///
    /// # Errors
    /// Returns `DispatchError::Validation` for malformed arguments.
    pub fn plan(&self, args: &Value) -> Result<Admission, DispatchError> {
        let parsed = parse_args(args)?;
        let model = select_model(&parsed);

        Ok(Admission {
            resource_key: model.clone(),
            token_cost: u64::from(parsed.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            cache_key: Some(cache_key(&parsed, &model)),
        })
    }

    /// Execute the completion
    ///
    /// # Errors
    /// Returns `DispatchError::Validation` or `DispatchError::Upstream`.
    pub async fn execute(&self, args: &Value) -> Result<ToolOutcome, DispatchError> {
        let parsed = parse_args(args)?;
        let model = select_model(&parsed);

        let mut messages = Vec::with_capacity(2);
        if let Some(system_prompt) = &parsed.system_prompt {
            messages.push(ChatMessage::system(system_prompt.clone()));
        }
        messages.push(ChatMessage::user(parsed.prompt.clone()));

        let request = ChatRequest {
            model: model.clone(),
            messages,
            max_tokens: Some(parsed.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            temperature: Some(parsed.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
            top_p: Some(parsed.top_p.unwrap_or(1.0)),
            response_format: parsed
                .json_mode
                .unwrap_or(false)
                .then(ResponseFormat::json_object),
        };

        info!(model = %model, max_tokens = ?request.max_tokens, "Requesting completion");

        let response = self.client.chat_completion(&request).await?;
        let usage = response.usage;

        let value = json!({
            "content": response.content().unwrap_or_default(),
            "model": model,
            "usage": usage,
            "finish_reason": response.finish_reason(),
            "timestamp": Utc::now().to_rfc3339(),
        });

        Ok(ToolOutcome::new(value).with_model(model).with_usage(usage))
    }

    /// TTL applied to cached completion results
    #[must_use]
    pub fn cache_ttl() -> std::time::Duration {
        CacheDefaults::DEFAULT_TTL
    }
}

fn parse_args(args: &Value) -> Result<CompletionArgs, DispatchError> {
    let parsed: CompletionArgs = serde_json::from_value(args.clone())?;
    parsed.validate()?;
    Ok(parsed)
}

fn select_model(args: &CompletionArgs) -> String {
    if let Some(model) = &args.model {
        return model.clone();
    }

    match args.priority {
        Some(Priority::Speed) | Some(Priority::Cost) => FAST_MODEL.to_string(),
        Some(Priority::Quality) => QUALITY_MODEL.to_string(),
        None => {
            let complexity = prompt_complexity(&args.prompt);
            debug!(complexity, "Auto-selecting completion model");
            if complexity > COMPLEXITY_THRESHOLD {
                QUALITY_MODEL.to_string()
            } else {
                FAST_MODEL.to_string()
            }
        }
    }
}

/// Score prompt complexity in [0, 1] from length, analytical keywords, and
/// question density
fn prompt_complexity(prompt: &str) -> f64 {
    let length = (prompt.len() as f64 / 1000.0).min(1.0);

    let lowered = prompt.to_lowercase();
    let keywords = ["analyze", "explain", "complex", "detailed", "comprehensive"]
        .iter()
        .any(|kw| lowered.contains(kw));
    let keyword_score = if keywords { 0.3 } else { 0.0 };

    let questions = prompt.matches('?').count() as f64 * 0.1;

    (length + keyword_score + questions).min(1.0)
}

fn cache_key(args: &CompletionArgs, model: &str) -> String {
    let mut hasher = DefaultHasher::new();
    args.prompt.hash(&mut hasher);
    args.system_prompt.hash(&mut hasher);
    args.temperature
        .unwrap_or(DEFAULT_TEMPERATURE)
        .to_bits()
        .hash(&mut hasher);
    args.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS).hash(&mut hasher);
    args.json_mode.unwrap_or(false).hash(&mut hasher);

    format!("completion:{model}:{:016x}", hasher.finish())
}
