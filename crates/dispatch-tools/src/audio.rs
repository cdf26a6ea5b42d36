//! Audio transcription tool.
//!
//! Transcribes (or translates) local audio files through the upstream Whisper
//! models. Audio resources carry no token budget, so the admission descriptor
//! declares a token cost of zero.

use crate::registry::{Admission, ToolOutcome};
use chrono::Utc;
use dispatch_core::{DispatchError, TranscriptionRequest, UpstreamClient};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const DEFAULT_MODEL: &str = "whisper-large-v3-turbo";
const DEFAULT_RESPONSE_FORMAT: &str = "json";

/// Rough bytes-per-second estimate for common audio formats
const BYTES_PER_SECOND_ESTIMATE: u64 = 16_000;

const ALLOWED_MODELS: [&str; 2] = ["whisper-large-v3", "whisper-large-v3-turbo"];
const ALLOWED_FORMATS: [&str; 5] = ["json", "text", "srt", "verbose_json", "vtt"];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TranscriptionArgs {
    audio_file: String,
    model: Option<String>,
    language: Option<String>,
    prompt: Option<String>,
    response_format: Option<String>,
    temperature: Option<f32>,
    translate: Option<bool>,
}

impl TranscriptionArgs {
    fn validate(&self) -> Result<(), DispatchError> {
        if self.audio_file.is_empty() {
            return Err(DispatchError::validation(
                "Audio file path is required",
                Some("audio_file".to_string()),
            ));
        }
        if let Some(model) = &self.model {
            if !ALLOWED_MODELS.contains(&model.as_str()) {
                return Err(DispatchError::validation(
                    format!("Unsupported transcription model: {model}"),
                    Some("model".to_string()),
                ));
            }
        }
        if let Some(format) = &self.response_format {
            if !ALLOWED_FORMATS.contains(&format.as_str()) {
                return Err(DispatchError::validation(
                    format!("Unsupported response format: {format}"),
                    Some("response_format".to_string()),
                ));
            }
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(DispatchError::validation(
                    "temperature must be between 0 and 1",
                    Some("temperature".to_string()),
                ));
            }
        }
        Ok(())
    }

    fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Audio transcription tool
pub struct AudioTranscriptionTool {
    client: Arc<dyn UpstreamClient>,
}

impl AudioTranscriptionTool {
    /// Tool name
    pub const NAME: &'static str = "groq_audio_transcription";
    /// Tool description
    pub const DESCRIPTION: &'static str =
        "Transcribe audio files using Groq Whisper models";

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
                "audio_file": {"type": "string", "minLength": 1, "description": "Path to the audio file"},
                "model": {"type": "string", "enum": ALLOWED_MODELS},
                "language": {"type": "string"},
                "prompt": {"type": "string"},
                "response_format": {"type": "string", "enum": ALLOWED_FORMATS},
                "temperature": {"type": "number", "minimum": 0, "maximum": 1},
                "translate": {"type": "boolean", "description": "Translate to English instead of transcribing"}
            },
            "required": ["audio_file"]
        })
    }

    /// Validate arguments and compute the admission descriptor
    ///
    /// # Errors
    /// Returns `DispatchError::Validation` for malformed arguments.
    pub fn plan(&self, args: &Value) -> Result<Admission, DispatchError> {
        let parsed = parse_args(args)?;

        Ok(Admission {
            resource_key: format!("audio_{}", parsed.model()),
            token_cost: 0,
            cache_key: None,
        })
    }

    /// Execute the transcription
    ///
    /// # Errors
    /// Returns `DispatchError::Validation` if the file is missing or
    /// `DispatchError::Upstream` on API failure.
    pub async fn execute(&self, args: &Value) -> Result<ToolOutcome, DispatchError> {
        let parsed = parse_args(args)?;
        let model = parsed.model().to_string();
        let path = PathBuf::from(&parsed.audio_file);

        let metadata = tokio::fs::metadata(&path).await.map_err(|_| {
            DispatchError::validation(
                format!("Audio file not found: {}", parsed.audio_file),
                Some("audio_file".to_string()),
            )
        })?;

        let request = TranscriptionRequest {
            file_path: path,
            model: model.clone(),
            language: parsed.language.clone(),
            prompt: parsed.prompt.clone(),
            response_format: parsed
                .response_format
                .clone()
                .unwrap_or_else(|| DEFAULT_RESPONSE_FORMAT.to_string()),
            temperature: parsed.temperature.unwrap_or(0.0),
            translate: parsed.translate.unwrap_or(false),
        };

        info!(
            model = %model,
            file = %parsed.audio_file,
            language = ?parsed.language,
            translate = request.translate,
            "Starting audio transcription"
        );

        let transcription = self.client.transcribe_audio(&request).await?;

        let value = json!({
            "transcription": transcription.text,
            "model": model,
            "language": parsed.language,
            "duration": metadata.len() / BYTES_PER_SECOND_ESTIMATE,
            "timestamp": Utc::now().to_rfc3339(),
        });

        Ok(ToolOutcome::new(value).with_model(model))
    }
}

fn parse_args(args: &Value) -> Result<TranscriptionArgs, DispatchError> {
    let parsed: TranscriptionArgs = serde_json::from_value(args.clone())?;
    parsed.validate()?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dispatch_core::{BatchJob, ChatRequest, ChatResponse, Transcription};
    use std::collections::HashMap;

    struct FixedClient;

    #[async_trait]
    impl UpstreamClient for FixedClient {
        async fn chat_completion(
            &self,
            _: &ChatRequest,
        ) -> Result<ChatResponse, DispatchError> {
            unimplemented!()
        }

        async fn transcribe_audio(
            &self,
            request: &TranscriptionRequest,
        ) -> Result<Transcription, DispatchError> {
            assert!(!request.translate);
            Ok(Transcription {
                text: "hello world".to_string(),
            })
        }

        async fn upload_batch_file(&self, _: String) -> Result<String, DispatchError> {
            unimplemented!()
        }

        async fn create_batch(
            &self,
            _: &str,
            _: &str,
            _: HashMap<String, String>,
        ) -> Result<BatchJob, DispatchError> {
            unimplemented!()
        }
    }

    fn tool() -> AudioTranscriptionTool {
        AudioTranscriptionTool::new(Arc::new(FixedClient))
    }

    #[test]
    fn test_plan_declares_audio_resource_with_zero_tokens() {
        let admission = tool().plan(&json!({"audio_file": "/tmp/a.wav"})).unwrap();

        assert_eq!(admission.resource_key, "audio_whisper-large-v3-turbo");
        assert_eq!(admission.token_cost, 0);
        assert!(admission.cache_key.is_none());

        let admission = tool()
            .plan(&json!({"audio_file": "/tmp/a.wav", "model": "whisper-large-v3"}))
            .unwrap();
        assert_eq!(admission.resource_key, "audio_whisper-large-v3");
    }

    #[test]
    fn test_validation() {
        assert!(tool().plan(&json!({})).is_err());
        assert!(tool().plan(&json!({"audio_file": ""})).is_err());
        assert!(tool()
            .plan(&json!({"audio_file": "/tmp/a.wav", "model": "whisper-tiny"}))
            .is_err());
        assert!(tool()
            .plan(&json!({"audio_file": "/tmp/a.wav", "response_format": "xml"}))
            .is_err());
        assert!(tool()
            .plan(&json!({"audio_file": "/tmp/a.wav", "temperature": 1.5}))
            .is_err());
    }

    #[tokio::test]
    async fn test_execute_missing_file_is_validation_error() {
        let err = tool()
            .execute(&json!({"audio_file": "/nonexistent/audio.wav"}))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Validation { .. }));
        assert!(err.to_string().contains("Audio file not found"));
    }

    #[tokio::test]
    async fn test_execute_transcribes_existing_file() {
        let path = std::env::temp_dir().join("dispatch-audio-test.wav");
        tokio::fs::write(&path, vec![0u8; 32_000]).await.unwrap();

        let outcome = tool()
            .execute(&json!({"audio_file": path.to_str().unwrap()}))
            .await
            .unwrap();

        assert_eq!(outcome.value["transcription"], json!("hello world"));
        assert_eq!(outcome.value["duration"], json!(2));
        assert_eq!(outcome.model.as_deref(), Some("whisper-large-v3-turbo"));

        tokio::fs::remove_file(&path).await.ok();
    }
}
