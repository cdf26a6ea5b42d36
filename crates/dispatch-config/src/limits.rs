//! Static rate-limit table for upstream resources.
//!
//! Limits follow the upstream API's published per-model ceilings. Keys are
//! model identifiers plus aggregate keys for modality-prefixed resources
//! (`audio_*`, `vision_*`) and the batch endpoint. The table is loaded once
//! at startup; a `tokens_per_minute` of 0 means the token dimension is not
//! enforced for that resource.

use std::collections::HashMap;

/// Per-resource rate limit: request and token ceilings over a 60s window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Requests per minute
    pub requests_per_minute: u32,
    /// Tokens per minute (0 = token dimension not enforced)
    pub tokens_per_minute: u32,
}

impl RateLimit {
    /// Create a new rate limit
    #[must_use]
    pub const fn new(requests_per_minute: u32, tokens_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            tokens_per_minute,
        }
    }
}

/// Build the default rate-limit table keyed by resource identifier
#[must_use]
pub fn default_rate_limits() -> HashMap<String, RateLimit> {
    let entries: [(&str, RateLimit); 25] = [
        // Text completion models
        ("llama-3.1-8b-instant", RateLimit::new(30, 30_000)),
        ("llama-3.3-70b-versatile", RateLimit::new(30, 6_000)),
        ("deepseek-r1-distill-llama-70b", RateLimit::new(20, 6_000)),
        ("qwen-qwq-32b", RateLimit::new(30, 6_000)),
        ("qwen/qwen3-32b", RateLimit::new(30, 6_000)),
        ("compound-beta", RateLimit::new(20, 4_000)),
        ("compound-beta-mini", RateLimit::new(40, 8_000)),
        ("allam-2-7b", RateLimit::new(35, 25_000)),
        ("gemma2-9b-it", RateLimit::new(30, 15_000)),
        ("llama3-70b-8192", RateLimit::new(30, 6_000)),
        ("llama3-8b-8192", RateLimit::new(30, 30_000)),
        ("meta-llama/llama-guard-4-12b", RateLimit::new(30, 10_000)),
        ("meta-llama/llama-prompt-guard-2-22m", RateLimit::new(50, 20_000)),
        ("meta-llama/llama-prompt-guard-2-86m", RateLimit::new(40, 15_000)),
        ("mistral-saba-24b", RateLimit::new(30, 10_000)),
        // Audio models (no token dimension)
        ("whisper-large-v3", RateLimit::new(20, 0)),
        ("whisper-large-v3-turbo", RateLimit::new(30, 0)),
        ("distil-whisper-large-v3-en", RateLimit::new(40, 0)),
        // Vision models
        ("llama-4-scout-17b-instruct", RateLimit::new(30, 6_000)),
        ("llama-4-maverick-17b-instruct", RateLimit::new(30, 6_000)),
        // Text-to-speech models (no token dimension)
        ("playai-tts", RateLimit::new(50, 0)),
        ("playai-tts-arabic", RateLimit::new(50, 0)),
        // Aggregate endpoint keys
        ("batch_processing", RateLimit::new(100, 0)),
        ("audio_whisper-large-v3", RateLimit::new(20, 0)),
        ("audio_whisper-large-v3-turbo", RateLimit::new(30, 0)),
    ];

    let mut limits = HashMap::with_capacity(entries.len() + 2);
    for (key, limit) in entries {
        limits.insert(key.to_string(), limit);
    }

    // Vision aggregate keys mirror their per-model limits
    limits.insert(
        "vision_llama-4-scout-17b-instruct".to_string(),
        RateLimit::new(30, 6_000),
    );
    limits.insert(
        "vision_llama-4-maverick-17b-instruct".to_string(),
        RateLimit::new(30, 6_000),
    );

    limits
}
