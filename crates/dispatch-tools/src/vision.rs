//! Vision analysis tool.
//!
//! Sends an image URL with a canned or caller-supplied prompt to the
//! multimodal models. Temperature is pinned low for consistent analysis.

use crate::registry::{Admission, ToolOutcome};
use chrono::Utc;
use dispatch_core::{
    ChatMessage, ChatRequest, ContentPart, DispatchError, ImageUrl, ResponseFormat,
    UpstreamClient,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

const DEFAULT_MODEL: &str = "llama-4-scout-17b-instruct";
const DEFAULT_MAX_TOKENS: u32 = 1000;
/// Pinned low for consistent analysis output
const ANALYSIS_TEMPERATURE: f32 = 0.3;

const ALLOWED_MODELS: [&str; 2] = [
    "llama-4-scout-17b-instruct",
    "llama-4-maverick-17b-instruct",
];

/// Canned analysis modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    /// General description
    Describe,
    /// Text extraction
    Ocr,
    /// Technical composition analysis
    Technical,
    /// Creative interpretation
    Creative,
}

impl AnalysisType {
    fn prompt(self) -> &'static str {
        match self {
            Self::Describe => {
                "Describe this image in detail, including objects, people, setting, colors, and overall composition."
            }
            Self::Ocr => {
                "Extract and transcribe all text visible in this image. Organize the text logically and indicate its position/context."
            }
            Self::Technical => {
                "Provide a technical analysis of this image including composition, lighting, quality, and any technical aspects."
            }
            Self::Creative => {
                "Provide a creative interpretation of this image, including mood, artistic elements, and storytelling aspects."
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VisionArgs {
    image_url: String,
    prompt: Option<String>,
    analysis_type: Option<AnalysisType>,
    detail_level: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    json_mode: Option<bool>,
}

impl VisionArgs {
    fn validate(&self) -> Result<(), DispatchError> {
        if reqwest::Url::parse(&self.image_url).is_err() {
            return Err(DispatchError::validation(
                "Valid image URL is required",
                Some("image_url".to_string()),
            ));
        }
        if let Some(model) = &self.model {
            if !ALLOWED_MODELS.contains(&model.as_str()) {
                return Err(DispatchError::validation(
                    format!("Unsupported vision model: {model}"),
                    Some("model".to_string()),
                ));
            }
        }
        if let Some(detail) = &self.detail_level {
            if detail != "low" && detail != "high" {
                return Err(DispatchError::validation(
                    "detail_level must be \"low\" or \"high\"",
                    Some("detail_level".to_string()),
                ));
            }
        }
        if let Some(max_tokens) = self.max_tokens {
            if !(1..=4000).contains(&max_tokens) {
                return Err(DispatchError::validation(
                    "max_tokens must be between 1 and 4000",
                    Some("max_tokens".to_string()),
                ));
            }
        }
        Ok(())
    }

    fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    fn effective_prompt(&self) -> String {
        self.prompt.clone().unwrap_or_else(|| {
            self.analysis_type
                .unwrap_or(AnalysisType::Describe)
                .prompt()
                .to_string()
        })
    }
}

/// Vision analysis tool
pub struct VisionAnalysisTool {
    client: Arc<dyn UpstreamClient>,
}

impl VisionAnalysisTool {
    /// Tool name
    pub const NAME: &'static str = "groq_vision_analysis";
    /// Tool description
    pub const DESCRIPTION: &'static str = "Analyze images using Groq multimodal models";

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
                "image_url": {"type": "string", "format": "uri", "description": "URL of the image to analyze"},
                "prompt": {"type": "string", "description": "Custom analysis prompt (overrides analysis_type)"},
                "analysis_type": {"type": "string", "enum": ["describe", "ocr", "technical", "creative"]},
                "detail_level": {"type": "string", "enum": ["low", "high"]},
                "model": {"type": "string", "enum": ALLOWED_MODELS},
                "max_tokens": {"type": "number", "minimum": 1, "maximum": 4000},
                "json_mode": {"type": "boolean"}
            },
            "required": ["image_url"]
        })
    }

    /// Validate arguments and compute the admission descriptor
    ///
    /// # Errors
    /// Returns `DispatchError::Validation` for malformed arguments.
    pub fn plan(&self, args: &Value) -> Result<Admission, DispatchError> {
        let parsed = parse_args(args)?;

        Ok(Admission {
            resource_key: format!("vision_{}", parsed.model()),
            token_cost: u64::from(parsed.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            cache_key: None,
        })
    }

    /// Execute the analysis
    ///
    /// # Errors
    /// Returns `DispatchError::Validation` or `DispatchError::Upstream`.
    pub async fn execute(&self, args: &Value) -> Result<ToolOutcome, DispatchError> {
        let parsed = parse_args(args)?;
        let model = parsed.model().to_string();
        let prompt = parsed.effective_prompt();

        let message = ChatMessage::user_parts(vec![
            ContentPart::Text {
                text: prompt.clone(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: parsed.image_url.clone(),
                    detail: Some(
                        parsed
                            .detail_level
                            .clone()
                            .unwrap_or_else(|| "high".to_string()),
                    ),
                },
            },
        ]);

        let request = ChatRequest {
            model: model.clone(),
            messages: vec![message],
            max_tokens: Some(parsed.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            temperature: Some(ANALYSIS_TEMPERATURE),
            top_p: None,
            response_format: parsed
                .json_mode
                .unwrap_or(false)
                .then(ResponseFormat::json_object),
        };

        info!(
            model = %model,
            analysis_type = ?parsed.analysis_type,
            "Starting vision analysis"
        );

        let response = self.client.chat_completion(&request).await?;
        let usage = response.usage;

        let value = json!({
            "analysis": response.content().unwrap_or_default(),
            "model": model,
            "analysis_type": parsed.analysis_type.map(|t| format!("{t:?}").to_lowercase()),
            "image_url": parsed.image_url,
            "usage": usage,
            "timestamp": Utc::now().to_rfc3339(),
        });

        Ok(ToolOutcome::new(value).with_model(model).with_usage(usage))
    }
}

fn parse_args(args: &Value) -> Result<VisionArgs, DispatchError> {
    let parsed: VisionArgs = serde_json::from_value(args.clone())?;
    parsed.validate()?;
    Ok(parsed)
}
