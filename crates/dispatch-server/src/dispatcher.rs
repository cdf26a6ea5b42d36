//! The dispatch core: per-invocation admission and orchestration.
//!
//! Each invocation walks a fixed sequence: shutdown check → tool resolution →
//! rate-limit admission → cache lookup (cacheable tools only) → retry-wrapped
//! execution → metrics recording → response envelope. Failures at any stage
//! are isolated into an error envelope; the process never crashes for an
//! invocation-level fault.
//!
//! Unknown-tool and shutting-down rejections happen before a tool is
//! resolved, so they consume no rate-limit points and touch no per-tool
//! metrics.

use crate::state::ServerState;
use dispatch_core::{sanitize_args, CallToolResult, DispatchError, ToolsListing};
use dispatch_tools::TextCompletionTool;
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{error, info};

/// A tool-invocation request
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolRequest {
    /// Tool name to invoke
    pub name: String,
    /// Structured arguments passed through to the tool
    #[serde(default)]
    pub arguments: Value,
}

/// The dispatch core
#[derive(Clone)]
pub struct Dispatcher {
    state: ServerState,
}

impl Dispatcher {
    /// Create a dispatcher over shared server state
    #[must_use]
    pub fn new(state: ServerState) -> Self {
        Self { state }
    }

    /// List registered tools
    #[must_use]
    pub fn list_tools(&self) -> ToolsListing {
        self.state.registry.list()
    }

    /// Dispatch one invocation, always returning an envelope.
    ///
    /// Failures are logged with sensitive argument fields redacted and
    /// rendered as an error envelope carrying a human-readable message.
    pub async fn dispatch(&self, request: &CallToolRequest) -> CallToolResult {
        let started = Instant::now();

        match self.dispatch_inner(request, started).await {
            Ok(result) => result,
            Err(err) => {
                error!(
                    tool = %request.name,
                    error = %err,
                    error_type = err.error_type(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    args = %sanitize_args(&request.arguments),
                    "Tool invocation failed"
                );
                CallToolResult::error(format!("Error executing {}: {err}", request.name))
            }
        }
    }

    async fn dispatch_inner(
        &self,
        request: &CallToolRequest,
        started: Instant,
    ) -> Result<CallToolResult, DispatchError> {
        // Drain: nothing executes once the shutdown flag is set
        if self.state.is_shutting_down() {
            return Err(DispatchError::ShuttingDown);
        }

        let Some(tool) = self.state.registry.get(&request.name) else {
            return Err(DispatchError::unknown_tool(&request.name));
        };

        let metrics = &self.state.metrics;
        metrics.increment_tool_usage(&request.name);

        let admission = match tool.plan(&request.arguments) {
            Ok(admission) => admission,
            Err(err) => {
                metrics.record_error(err.error_type());
                return Err(err);
            }
        };

        if let Err(err) = self
            .state
            .limiter
            .check_limit(&admission.resource_key, admission.token_cost)
            .await
        {
            metrics.record_rate_limit_hit(&admission.resource_key);
            metrics.record_error(err.error_type());
            return Err(err);
        }

        // Cache lookup short-circuits execution for cacheable tools
        if let Some(cache_key) = &admission.cache_key {
            if let Some(cached) = self.state.cache.get(cache_key).await {
                metrics.record_cache_hit();
                metrics.record_response_time(started.elapsed());
                metrics.record_success();

                info!(
                    tool = %request.name,
                    resource = %admission.resource_key,
                    "Returning cached result"
                );
                return Ok(CallToolResult::success(&cached));
            }
            metrics.record_cache_miss();
        }

        let outcome = match self
            .state
            .retry_policy
            .execute(|| async move { tool.execute(&request.arguments).await })
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                metrics.record_error(err.error_type());
                return Err(err);
            }
        };

        if let Some(cache_key) = &admission.cache_key {
            self.state
                .cache
                .set(
                    cache_key.clone(),
                    outcome.value.clone(),
                    Some(TextCompletionTool::cache_ttl()),
                )
                .await;
        }

        let duration = started.elapsed();
        if let (Some(usage), Some(model)) = (outcome.usage, outcome.model.as_deref()) {
            metrics.record_token_usage(
                u64::from(usage.prompt_tokens),
                u64::from(usage.completion_tokens),
                model,
            );
        }
        metrics.record_response_time(duration);
        metrics.record_success();

        info!(
            tool = %request.name,
            resource = %admission.resource_key,
            duration_ms = duration.as_millis() as u64,
            "Tool executed successfully"
        );

        Ok(CallToolResult::success(&outcome.value))
    }
}
