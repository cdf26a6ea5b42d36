//! # Dispatch Tools
//!
//! The gateway's tool surface: text completion, audio transcription, vision
//! analysis, and batch submission, each a thin payload-shaping wrapper around
//! the upstream client. The registry exposes them as a closed set of tagged
//! variants behind one capability interface.

#![forbid(unsafe_code)]

pub mod audio;
pub mod batch;
pub mod completion;
pub mod groq;
pub mod registry;
pub mod vision;

// Re-export main types
pub use audio::AudioTranscriptionTool;
pub use batch::BatchProcessingTool;
pub use completion::TextCompletionTool;
pub use groq::GroqClient;
pub use registry::{
    default_registry, Admission, ToolHandle, ToolOutcome, ToolRegistry, ToolRegistryBuilder,
};
pub use vision::VisionAnalysisTool;
