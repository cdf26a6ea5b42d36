//! # Dispatch Core
//!
//! Shared contracts for the Groq tool-dispatch gateway:
//! - Error taxonomy with retryability classification
//! - The uniform tool-invocation response envelope
//! - Sensitive-argument redaction for failure logging
//! - The upstream client trait the tools call through

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod envelope;
pub mod error;
pub mod types;
pub mod upstream;

// Re-export main types
pub use envelope::{sanitize_args, CallToolResult, ContentBlock, ToolInfo, ToolsListing};
pub use error::{DispatchError, DispatchResult};
pub use types::{ApiKey, RequestId};
pub use upstream::{
    BatchJob, ChatMessage, ChatRequest, ChatResponse, Choice, ContentPart, ImageUrl,
    MessageContent, MessageRole, ResponseFormat, ResponseMessage, Transcription,
    TranscriptionRequest, UpstreamClient, Usage,
};
