//! Groq API client.
//!
//! Implements [`UpstreamClient`] over the Groq OpenAI-compatible REST API.
//! Transport details live here: endpoints, bearer auth, the fixed request
//! timeout, and the mapping from HTTP failures to `DispatchError::Upstream`
//! with status/code detail the retry classification reads.

use async_trait::async_trait;
use dispatch_config::constants::UPSTREAM_TIMEOUT;
use dispatch_core::{
    ApiKey, BatchJob, ChatRequest, ChatResponse, DispatchError, Transcription,
    TranscriptionRequest, UpstreamClient,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Error body shape returned by the upstream API
#[derive(Debug, Deserialize)]
struct UpstreamErrorBody {
    error: UpstreamErrorDetail,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// Groq API client
pub struct GroqClient {
    client: Client,
    base_url: String,
    api_key: ApiKey,
}

impl GroqClient {
    /// Create a new client with the default base URL and timeout
    ///
    /// # Errors
    /// Returns `DispatchError::Configuration` if the HTTP client cannot be built
    pub fn new(api_key: ApiKey) -> Result<Self, DispatchError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a new client against a custom base URL
    ///
    /// # Errors
    /// Returns `DispatchError::Configuration` if the HTTP client cannot be built
    pub fn with_base_url(
        api_key: ApiKey,
        base_url: impl Into<String>,
    ) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .connect_timeout(UPSTREAM_TIMEOUT)
            .build()
            .map_err(|e| {
                DispatchError::configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Turn a non-success response into an upstream error with status and code
    async fn error_from_response(response: Response) -> DispatchError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        match serde_json::from_str::<UpstreamErrorBody>(&body) {
            Ok(parsed) => {
                DispatchError::upstream(parsed.error.message, Some(status), parsed.error.code)
            }
            Err(_) => DispatchError::upstream(
                format!("Upstream returned status {status}"),
                Some(status),
                None,
            ),
        }
    }

    /// Map a transport failure to an upstream error with a retryable code
    fn error_from_transport(err: reqwest::Error) -> DispatchError {
        let code = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connection_error"
        } else {
            "request_error"
        };
        DispatchError::upstream(err.to_string(), None, Some(code.to_string()))
    }

    async fn parse_json<T: for<'de> Deserialize<'de>>(
        response: Response,
    ) -> Result<T, DispatchError> {
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        response.json().await.map_err(Self::error_from_transport)
    }
}

#[async_trait]
impl UpstreamClient for GroqClient {
    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse, DispatchError> {
        debug!(model = %request.model, "POST /chat/completions");

        let response = self
            .client
            .post(self.url("/chat/completions"))
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(Self::error_from_transport)?;

        Self::parse_json(response).await
    }

    async fn transcribe_audio(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<Transcription, DispatchError> {
        let path = if request.translate {
            "/audio/translations"
        } else {
            "/audio/transcriptions"
        };
        debug!(model = %request.model, translate = request.translate, "POST {path}");

        let bytes = tokio::fs::read(&request.file_path).await?;
        let file_name = request
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        let mut form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("model", request.model.clone())
            .text("response_format", request.response_format.clone())
            .text("temperature", request.temperature.to_string());

        if let Some(language) = &request.language {
            form = form.text("language", language.clone());
        }
        if let Some(prompt) = &request.prompt {
            form = form.text("prompt", prompt.clone());
        }

        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(Self::error_from_transport)?;

        // plain-text formats (text/srt/vtt) come back unwrapped
        if response.status().is_success()
            && matches!(request.response_format.as_str(), "text" | "srt" | "vtt")
        {
            let text = response.text().await.map_err(Self::error_from_transport)?;
            return Ok(Transcription { text });
        }

        Self::parse_json(response).await
    }

    async fn upload_batch_file(&self, jsonl: String) -> Result<String, DispatchError> {
        debug!(bytes = jsonl.len(), "POST /files");

        let form = Form::new()
            .part(
                "file",
                Part::bytes(jsonl.into_bytes()).file_name("batch_requests.jsonl"),
            )
            .text("purpose", "batch");

        let response = self
            .client
            .post(self.url("/files"))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(Self::error_from_transport)?;

        #[derive(Deserialize)]
        struct FileUpload {
            #[serde(default)]
            id: Option<String>,
        }

        let upload: FileUpload = Self::parse_json(response).await?;
        upload
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                DispatchError::upstream(
                    "Upload did not return a file id",
                    Some(StatusCode::BAD_GATEWAY.as_u16()),
                    None,
                )
            })
    }

    async fn create_batch(
        &self,
        input_file_id: &str,
        completion_window: &str,
        metadata: HashMap<String, String>,
    ) -> Result<BatchJob, DispatchError> {
        debug!(input_file_id, completion_window, "POST /batches");

        let body = json!({
            "input_file_id": input_file_id,
            "endpoint": "/v1/chat/completions",
            "completion_window": completion_window,
            "metadata": metadata,
        });

        let response = self
            .client
            .post(self.url("/batches"))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(Self::error_from_transport)?;

        Self::parse_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GroqClient {
        GroqClient::new(ApiKey::new("gsk-test").unwrap()).unwrap()
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let client = client();
        assert_eq!(
            client.url("/chat/completions"),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_custom_base_url() {
        let client =
            GroqClient::with_base_url(ApiKey::new("gsk-test").unwrap(), "http://localhost:9999")
                .unwrap();
        assert_eq!(client.url("/files"), "http://localhost:9999/files");
    }

    #[test]
    fn test_upstream_error_body_parses_code() {
        let body: UpstreamErrorBody = serde_json::from_str(
            r#"{"error": {"message": "Rate limit reached", "code": "rate_limit_exceeded", "type": "tokens"}}"#,
        )
        .unwrap();

        assert_eq!(body.error.message, "Rate limit reached");
        assert_eq!(body.error.code.as_deref(), Some("rate_limit_exceeded"));
    }
}
