//! Batch submission tool.
//!
//! Assembles a JSONL batch of chat requests, uploads it, and creates a batch
//! job. Requests without a custom id get a generated one so results can be
//! correlated.

use crate::registry::{Admission, ToolOutcome};
use chrono::{Duration as ChronoDuration, Utc};
use dispatch_core::{DispatchError, RequestId, UpstreamClient};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

const MAX_BATCH_REQUESTS: usize = 50_000;
const DEFAULT_COMPLETION_WINDOW: &str = "24h";
const BATCH_ENDPOINT: &str = "/v1/chat/completions";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BatchMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BatchBody {
    model: String,
    messages: Vec<BatchMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BatchRequestItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_id: Option<String>,
    method: String,
    url: String,
    body: BatchBody,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BatchArgs {
    requests: Vec<BatchRequestItem>,
    completion_window: Option<String>,
    metadata: Option<HashMap<String, String>>,
}

impl BatchArgs {
    fn validate(&self) -> Result<(), DispatchError> {
        if self.requests.is_empty() || self.requests.len() > MAX_BATCH_REQUESTS {
            return Err(DispatchError::validation(
                format!("requests must contain between 1 and {MAX_BATCH_REQUESTS} items"),
                Some("requests".to_string()),
            ));
        }
        for (index, item) in self.requests.iter().enumerate() {
            if item.method != "POST" {
                return Err(DispatchError::validation(
                    format!("request {index}: method must be POST"),
                    Some("requests".to_string()),
                ));
            }
            if item.url != BATCH_ENDPOINT {
                return Err(DispatchError::validation(
                    format!("request {index}: url must be {BATCH_ENDPOINT}"),
                    Some("requests".to_string()),
                ));
            }
            for message in &item.body.messages {
                if !matches!(message.role.as_str(), "system" | "user" | "assistant") {
                    return Err(DispatchError::validation(
                        format!("request {index}: invalid message role {}", message.role),
                        Some("requests".to_string()),
                    ));
                }
            }
        }
        if let Some(window) = &self.completion_window {
            if window != "24h" && window != "7d" {
                return Err(DispatchError::validation(
                    "completion_window must be \"24h\" or \"7d\"",
                    Some("completion_window".to_string()),
                ));
            }
        }
        Ok(())
    }

    fn window(&self) -> &str {
        self.completion_window
            .as_deref()
            .unwrap_or(DEFAULT_COMPLETION_WINDOW)
    }
}

/// Batch submission tool
pub struct BatchProcessingTool {
    client: Arc<dyn UpstreamClient>,
}

impl BatchProcessingTool {
    /// Tool name
    pub const NAME: &'static str = "groq_batch_processing";
    /// Tool description
    pub const DESCRIPTION: &'static str =
        "Process large batches of requests with 25% discount";

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
                "requests": {
                    "type": "array",
                    "minItems": 1,
                    "maxItems": MAX_BATCH_REQUESTS,
                    "items": {
                        "type": "object",
                        "properties": {
                            "custom_id": {"type": "string"},
                            "method": {"type": "string", "const": "POST"},
                            "url": {"type": "string", "const": BATCH_ENDPOINT},
                            "body": {
                                "type": "object",
                                "properties": {
                                    "model": {"type": "string"},
                                    "messages": {
                                        "type": "array",
                                        "items": {
                                            "type": "object",
                                            "properties": {
                                                "role": {"type": "string", "enum": ["system", "user", "assistant"]},
                                                "content": {"type": "string"}
                                            },
                                            "required": ["role", "content"]
                                        }
                                    },
                                    "max_tokens": {"type": "number"},
                                    "temperature": {"type": "number"}
                                },
                                "required": ["model", "messages"]
                            }
                        },
                        "required": ["method", "url", "body"]
                    }
                },
                "completion_window": {"type": "string", "enum": ["24h", "7d"]},
                "metadata": {"type": "object", "additionalProperties": {"type": "string"}}
            },
            "required": ["requests"]
        })
    }

    /// Validate arguments and compute the admission descriptor
    ///
    /// # Errors
    /// Returns `DispatchError::Validation` for malformed arguments.
    pub fn plan(&self, args: &Value) -> Result<Admission, DispatchError> {
        parse_args(args)?;

        Ok(Admission {
            resource_key: "batch_processing".to_string(),
            token_cost: 0,
            cache_key: None,
        })
    }

    /// Execute the batch submission
    ///
    /// # Errors
    /// Returns `DispatchError::Validation` or `DispatchError::Upstream`.
    pub async fn execute(&self, args: &Value) -> Result<ToolOutcome, DispatchError> {
        let parsed = parse_args(args)?;
        let window = parsed.window().to_string();

        let requests = fill_custom_ids(parsed.requests.clone());
        let request_count = requests.len();

        info!(
            request_count,
            completion_window = %window,
            "Starting batch submission"
        );

        let jsonl = to_jsonl(&requests)?;
        let input_file_id = self.client.upload_batch_file(jsonl).await?;
        let batch = self
            .client
            .create_batch(
                &input_file_id,
                &window,
                parsed.metadata.clone().unwrap_or_default(),
            )
            .await?;

        info!(batch_id = %batch.id, request_count, "Batch submission created");

        let value = json!({
            "batch_id": batch.id,
            "status": batch.status,
            "request_count": request_count,
            "completion_window": window,
            "created_at": batch.created_at,
            "estimated_completion": estimated_completion(&window),
            "cost_savings": "25% discount applied",
            "timestamp": Utc::now().to_rfc3339(),
        });

        Ok(ToolOutcome::new(value))
    }
}

fn parse_args(args: &Value) -> Result<BatchArgs, DispatchError> {
    let parsed: BatchArgs = serde_json::from_value(args.clone())?;
    parsed.validate()?;
    Ok(parsed)
}

/// Fill absent custom ids with generated UUIDs, preserving provided ones
fn fill_custom_ids(requests: Vec<BatchRequestItem>) -> Vec<BatchRequestItem> {
    requests
        .into_iter()
        .map(|mut item| {
            if item.custom_id.is_none() {
                item.custom_id = Some(RequestId::generate().to_string());
            }
            item
        })
        .collect()
}

fn to_jsonl(requests: &[BatchRequestItem]) -> Result<String, DispatchError> {
    let lines: Result<Vec<String>, _> = requests.iter().map(serde_json::to_string).collect();
    Ok(lines?.join("\n"))
}

fn estimated_completion(window: &str) -> String {
    let hours = if window == "24h" { 24 } else { 7 * 24 };
    (Utc::now() + ChronoDuration::hours(hours)).to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dispatch_core::{
        BatchJob, ChatRequest, ChatResponse, Transcription, TranscriptionRequest,
    };

    struct RecordingClient;

    #[async_trait]
    impl UpstreamClient for RecordingClient {
        async fn chat_completion(
            &self,
            _: &ChatRequest,
        ) -> Result<ChatResponse, DispatchError> {
            unimplemented!()
        }

        async fn transcribe_audio(
            &self,
            _: &TranscriptionRequest,
        ) -> Result<Transcription, DispatchError> {
            unimplemented!()
        }

        async fn upload_batch_file(&self, jsonl: String) -> Result<String, DispatchError> {
            // every line must be valid JSON with a custom_id
            for line in jsonl.lines() {
                let item: Value = serde_json::from_str(line).expect("valid JSONL line");
                assert!(item["custom_id"].is_string());
            }
            Ok("file-123".to_string())
        }

        async fn create_batch(
            &self,
            input_file_id: &str,
            completion_window: &str,
            _: HashMap<String, String>,
        ) -> Result<BatchJob, DispatchError> {
            assert_eq!(input_file_id, "file-123");
            assert_eq!(completion_window, "24h");
            Ok(BatchJob {
                id: "batch-abc".to_string(),
                status: "validating".to_string(),
                created_at: Some(1_700_000_000),
            })
        }
    }

    fn tool() -> BatchProcessingTool {
        BatchProcessingTool::new(Arc::new(RecordingClient))
    }

    fn request_item(custom_id: Option<&str>) -> Value {
        json!({
            "custom_id": custom_id,
            "method": "POST",
            "url": "/v1/chat/completions",
            "body": {
                "model": "llama-3.1-8b-instant",
                "messages": [{"role": "user", "content": "hi"}]
            }
        })
    }

    #[test]
    fn test_plan_uses_batch_aggregate_key() {
        let admission = tool()
            .plan(&json!({"requests": [request_item(None)]}))
            .unwrap();

        assert_eq!(admission.resource_key, "batch_processing");
        assert_eq!(admission.token_cost, 0);
    }

    #[test]
    fn test_validation() {
        assert!(tool().plan(&json!({"requests": []})).is_err());

        let bad_method = json!({"requests": [{
            "method": "GET",
            "url": "/v1/chat/completions",
            "body": {"model": "m", "messages": []}
        }]});
        assert!(tool().plan(&bad_method).is_err());

        let bad_url = json!({"requests": [{
            "method": "POST",
            "url": "/v1/embeddings",
            "body": {"model": "m", "messages": []}
        }]});
        assert!(tool().plan(&bad_url).is_err());

        let bad_window = json!({
            "requests": [request_item(None)],
            "completion_window": "48h"
        });
        assert!(tool().plan(&bad_window).is_err());
    }

    #[test]
    fn test_fill_custom_ids_preserves_provided() {
        let items: Vec<BatchRequestItem> = vec![
            serde_json::from_value(request_item(Some("mine"))).unwrap(),
            serde_json::from_value(request_item(None)).unwrap(),
        ];

        let filled = fill_custom_ids(items);
        assert_eq!(filled[0].custom_id.as_deref(), Some("mine"));
        assert!(filled[1].custom_id.is_some());
        assert_ne!(filled[0].custom_id, filled[1].custom_id);
    }

    #[tokio::test]
    async fn test_execute_uploads_and_creates_batch() {
        let outcome = tool()
            .execute(&json!({
                "requests": [request_item(None), request_item(Some("req-1"))]
            }))
            .await
            .unwrap();

        assert_eq!(outcome.value["batch_id"], json!("batch-abc"));
        assert_eq!(outcome.value["status"], json!("validating"));
        assert_eq!(outcome.value["request_count"], json!(2));
        assert_eq!(outcome.value["completion_window"], json!("24h"));
        assert!(outcome.value["estimated_completion"].is_string());
    }
}
