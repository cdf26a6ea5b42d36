//! Upstream client trait and request/response types.
//!
//! The tools talk to the inference API exclusively through [`UpstreamClient`],
//! so tests can substitute a scripted implementation and the HTTP details
//! stay in one place.

use crate::error::DispatchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Message role in a chat conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction
    System,
    /// End-user message
    User,
    /// Model response
    Assistant,
}

/// Image reference in a multimodal message part
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    /// Image URL
    pub url: String,
    /// Detail level ("low" or "high")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A part of a multimodal message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text part
    Text {
        /// The text
        text: String,
    },
    /// Image part
    ImageUrl {
        /// The image reference
        image_url: ImageUrl,
    },
}

/// Message content: plain text or multimodal parts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content
    Text(String),
    /// Multimodal content parts
    Parts(Vec<ContentPart>),
}

/// A chat message sent to the upstream API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role
    pub role: MessageRole,
    /// Message content
    pub content: MessageContent,
}

impl ChatMessage {
    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a user message with multimodal parts
    #[must_use]
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Parts(parts),
        }
    }
}

/// Response format selector (JSON mode)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFormat {
    /// Format type
    #[serde(rename = "type")]
    pub kind: String,
}

impl ResponseFormat {
    /// JSON object mode
    #[must_use]
    pub fn json_object() -> Self {
        Self {
            kind: "json_object".to_string(),
        }
    }
}

/// A chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Response format (JSON mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

/// A message in a completion response choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Message role
    pub role: String,
    /// Generated content
    #[serde(default)]
    pub content: Option<String>,
}

/// A completion choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// The generated message
    pub message: ResponseMessage,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,
    /// Tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

/// A chat completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Response identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Model that produced the response
    pub model: String,
    /// Completion choices
    pub choices: Vec<Choice>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Get the first choice's content (convenience accessor)
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.message.content.as_deref())
    }

    /// Get the first choice's finish reason
    #[must_use]
    pub fn finish_reason(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.finish_reason.as_deref())
    }
}

/// An audio transcription (or translation) request
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    /// Path to the audio file
    pub file_path: PathBuf,
    /// Whisper model identifier
    pub model: String,
    /// Source language hint
    pub language: Option<String>,
    /// Transcription prompt
    pub prompt: Option<String>,
    /// Output format (json, text, srt, verbose_json, vtt)
    pub response_format: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Translate to English instead of transcribing
    pub translate: bool,
}

/// Transcribed text returned by the upstream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcription {
    /// The transcribed text
    pub text: String,
}

/// A created batch job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    /// Batch identifier
    pub id: String,
    /// Current batch status
    pub status: String,
    /// Creation timestamp (Unix epoch seconds)
    #[serde(default)]
    pub created_at: Option<i64>,
}

/// Client contract for the upstream inference API.
///
/// Implementations own the transport details (endpoints, auth, timeouts);
/// callers see only domain operations and `DispatchError` failures.
#[async_trait]
pub trait UpstreamClient: Send + Sync + 'static {
    /// Execute a chat completion
    ///
    /// # Errors
    /// Returns `DispatchError::Upstream` on API or transport failure
    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse, DispatchError>;

    /// Transcribe (or translate) an audio file
    ///
    /// # Errors
    /// Returns `DispatchError::Upstream` on API or transport failure
    async fn transcribe_audio(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<Transcription, DispatchError>;

    /// Upload a JSONL batch input file, returning its file id
    ///
    /// # Errors
    /// Returns `DispatchError::Upstream` on API or transport failure
    async fn upload_batch_file(&self, jsonl: String) -> Result<String, DispatchError>;

    /// Create a batch job over a previously uploaded input file
    ///
    /// # Errors
    /// Returns `DispatchError::Upstream` on API or transport failure
    async fn create_batch(
        &self,
        input_file_id: &str,
        completion_window: &str,
        metadata: HashMap<String, String>,
    ) -> Result<BatchJob, DispatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_message_constructors() {
        let msg = ChatMessage::system("be terse");
        assert_eq!(msg.role, MessageRole::System);

        let msg = ChatMessage::user("hello");
        assert_eq!(msg.role, MessageRole::User);
    }

    #[test]
    fn test_chat_request_serialization_skips_absent_fields() {
        let request = ChatRequest {
            model: "llama-3.1-8b-instant".to_string(),
            messages: vec![ChatMessage::user("hi")],
            max_tokens: Some(100),
            temperature: None,
            top_p: None,
            response_format: None,
        };

        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["max_tokens"], json!(100));
        assert!(json.get("temperature").is_none());
        assert!(json.get("response_format").is_none());
    }

    #[test]
    fn test_multimodal_message_wire_shape() {
        let msg = ChatMessage::user_parts(vec![
            ContentPart::Text {
                text: "what is this".to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "https://example.com/cat.png".to_string(),
                    detail: Some("high".to_string()),
                },
            },
        ]);

        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(json["content"][0]["type"], json!("text"));
        assert_eq!(json["content"][1]["type"], json!("image_url"));
        assert_eq!(
            json["content"][1]["image_url"]["url"],
            json!("https://example.com/cat.png")
        );
    }

    #[test]
    fn test_chat_response_accessors() {
        let response: ChatResponse = serde_json::from_value(json!({
            "model": "llama-3.1-8b-instant",
            "choices": [{
                "message": {"role": "assistant", "content": "hi there"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
        }))
        .expect("deserialize");

        assert_eq!(response.content(), Some("hi there"));
        assert_eq!(response.finish_reason(), Some("stop"));
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(8));
    }
}
