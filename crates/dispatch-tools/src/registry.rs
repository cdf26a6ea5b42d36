//! Tool registry: a closed set of tagged variants behind one capability
//! interface.
//!
//! Each tool exposes a name, a description, a JSON-Schema input description,
//! an admission descriptor (the rate-limit resource key, token cost, and
//! cache key for an invocation), and an execute operation. The builder
//! appends variants; `freeze()` produces the immutable name→tool mapping the
//! dispatcher resolves against. Nothing is registered after startup.

use crate::{
    audio::AudioTranscriptionTool, batch::BatchProcessingTool, completion::TextCompletionTool,
    vision::VisionAnalysisTool,
};
use dispatch_core::{DispatchError, ToolInfo, ToolsListing, UpstreamClient, Usage};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Admission descriptor a tool declares for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Rate-limit resource key (may differ from the tool name, e.g. a model id)
    pub resource_key: String,
    /// Token points to consume from the resource's token window
    pub token_cost: u64,
    /// Cache key for idempotent invocations; None = not cacheable
    pub cache_key: Option<String>,
}

/// The outcome of a tool execution
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    /// Result payload rendered into the response envelope
    pub value: Value,
    /// Model that served the invocation, when one was involved
    pub model: Option<String>,
    /// Token usage reported by the upstream, when available
    pub usage: Option<Usage>,
}

impl ToolOutcome {
    /// Outcome with just a payload
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            value,
            model: None,
            usage: None,
        }
    }

    /// Attach the serving model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Attach upstream token usage
    #[must_use]
    pub fn with_usage(mut self, usage: Option<Usage>) -> Self {
        self.usage = usage;
        self
    }
}

/// One registered tool: a closed set of variants, one per tool kind
pub enum ToolHandle {
    /// Text completion
    Completion(TextCompletionTool),
    /// Audio transcription
    Audio(AudioTranscriptionTool),
    /// Vision analysis
    Vision(VisionAnalysisTool),
    /// Batch submission
    Batch(BatchProcessingTool),
}

impl ToolHandle {
    /// Unique tool name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Completion(_) => TextCompletionTool::NAME,
            Self::Audio(_) => AudioTranscriptionTool::NAME,
            Self::Vision(_) => VisionAnalysisTool::NAME,
            Self::Batch(_) => BatchProcessingTool::NAME,
        }
    }

    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Completion(_) => TextCompletionTool::DESCRIPTION,
            Self::Audio(_) => AudioTranscriptionTool::DESCRIPTION,
            Self::Vision(_) => VisionAnalysisTool::DESCRIPTION,
            Self::Batch(_) => BatchProcessingTool::DESCRIPTION,
        }
    }

    /// JSON-Schema-shaped input description
    #[must_use]
    pub fn input_schema(&self) -> Value {
        match self {
            Self::Completion(t) => t.input_schema(),
            Self::Audio(t) => t.input_schema(),
            Self::Vision(t) => t.input_schema(),
            Self::Batch(t) => t.input_schema(),
        }
    }

    /// Validate arguments and compute the admission descriptor.
    ///
    /// # Errors
    /// Returns `DispatchError::Validation` for malformed arguments.
    pub fn plan(&self, args: &Value) -> Result<Admission, DispatchError> {
        match self {
            Self::Completion(t) => t.plan(args),
            Self::Audio(t) => t.plan(args),
            Self::Vision(t) => t.plan(args),
            Self::Batch(t) => t.plan(args),
        }
    }

    /// Execute the tool against the upstream API.
    ///
    /// # Errors
    /// Returns `DispatchError::Validation` for malformed arguments or
    /// `DispatchError::Upstream` for API failures.
    pub async fn execute(&self, args: &Value) -> Result<ToolOutcome, DispatchError> {
        match self {
            Self::Completion(t) => t.execute(args).await,
            Self::Audio(t) => t.execute(args).await,
            Self::Vision(t) => t.execute(args).await,
            Self::Batch(t) => t.execute(args).await,
        }
    }

    /// Tool metadata for the list-tools query
    #[must_use]
    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Builder that appends tool variants before the registry is frozen
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<ToolHandle>,
}

impl ToolRegistryBuilder {
    /// Create an empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tool variant
    #[must_use]
    pub fn with_tool(mut self, tool: ToolHandle) -> Self {
        self.tools.push(tool);
        self
    }

    /// Freeze the registry.
    ///
    /// # Errors
    /// Returns `DispatchError::Configuration` on duplicate tool names.
    pub fn freeze(self) -> Result<ToolRegistry, DispatchError> {
        let mut tools = HashMap::with_capacity(self.tools.len());
        let mut order = Vec::with_capacity(self.tools.len());

        for tool in self.tools {
            let name = tool.name();
            if tools.insert(name.to_string(), tool).is_some() {
                return Err(DispatchError::configuration(format!(
                    "Tool already registered: {name}"
                )));
            }
            order.push(name.to_string());
        }

        info!(tools = order.len(), "Tool registry frozen");

        Ok(ToolRegistry { tools, order })
    }
}

/// Immutable name→tool registry, created once at startup
pub struct ToolRegistry {
    tools: HashMap<String, ToolHandle>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// Look up a tool by exact name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolHandle> {
        self.tools.get(name)
    }

    /// List registered tools in registration order
    #[must_use]
    pub fn list(&self) -> ToolsListing {
        ToolsListing {
            tools: self
                .order
                .iter()
                .filter_map(|name| self.tools.get(name))
                .map(ToolHandle::info)
                .collect(),
        }
    }

    /// Number of registered tools
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Build the standard registry: all four tools over one upstream client.
///
/// # Errors
/// Returns `DispatchError::Configuration` if registration fails.
pub fn default_registry(
    client: Arc<dyn UpstreamClient>,
) -> Result<ToolRegistry, DispatchError> {
    ToolRegistryBuilder::new()
        .with_tool(ToolHandle::Completion(TextCompletionTool::new(Arc::clone(
            &client,
        ))))
        .with_tool(ToolHandle::Audio(AudioTranscriptionTool::new(Arc::clone(
            &client,
        ))))
        .with_tool(ToolHandle::Vision(VisionAnalysisTool::new(Arc::clone(
            &client,
        ))))
        .with_tool(ToolHandle::Batch(BatchProcessingTool::new(client)))
        .freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dispatch_core::{
        BatchJob, ChatRequest, ChatResponse, Transcription, TranscriptionRequest,
    };

    struct NullClient;

    #[async_trait]
    impl UpstreamClient for NullClient {
        async fn chat_completion(
            &self,
            _: &ChatRequest,
        ) -> Result<ChatResponse, DispatchError> {
            Err(DispatchError::internal("not wired"))
        }

        async fn transcribe_audio(
            &self,
            _: &TranscriptionRequest,
        ) -> Result<Transcription, DispatchError> {
            Err(DispatchError::internal("not wired"))
        }

        async fn upload_batch_file(&self, _: String) -> Result<String, DispatchError> {
            Err(DispatchError::internal("not wired"))
        }

        async fn create_batch(
            &self,
            _: &str,
            _: &str,
            _: HashMap<String, String>,
        ) -> Result<BatchJob, DispatchError> {
            Err(DispatchError::internal("not wired"))
        }
    }

    #[test]
    fn test_default_registry_has_all_tools() {
        let registry = default_registry(Arc::new(NullClient)).expect("registry");

        assert_eq!(registry.len(), 4);
        assert!(registry.get("groq_text_completion").is_some());
        assert!(registry.get("groq_audio_transcription").is_some());
        assert!(registry.get("groq_vision_analysis").is_some());
        assert!(registry.get("groq_batch_processing").is_some());
    }

    #[test]
    fn test_unknown_name_not_resolved() {
        let registry = default_registry(Arc::new(NullClient)).expect("registry");
        assert!(registry.get("groq_text_completion_v2").is_none());
        assert!(registry.get("").is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let client: Arc<dyn UpstreamClient> = Arc::new(NullClient);

        let result = ToolRegistryBuilder::new()
            .with_tool(ToolHandle::Completion(TextCompletionTool::new(Arc::clone(
                &client,
            ))))
            .with_tool(ToolHandle::Completion(TextCompletionTool::new(client)))
            .freeze();

        assert!(result.is_err());
    }

    #[test]
    fn test_listing_preserves_registration_order() {
        let registry = default_registry(Arc::new(NullClient)).expect("registry");
        let listing = registry.list();

        let names: Vec<&str> = listing.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "groq_text_completion",
                "groq_audio_transcription",
                "groq_vision_analysis",
                "groq_batch_processing"
            ]
        );

        for tool in &listing.tools {
            assert!(!tool.description.is_empty());
            assert_eq!(tool.input_schema["type"], serde_json::json!("object"));
        }
    }
}
