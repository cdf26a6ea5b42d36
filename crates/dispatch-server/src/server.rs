//! Stdio server: framing loop and graceful shutdown.
//!
//! Requests arrive as newline-delimited JSON on stdin; each produces exactly
//! one JSON response line on stdout. Log output never touches stdout. A
//! malformed frame gets an error envelope rather than terminating the loop.
//!
//! SIGINT/SIGTERM start graceful shutdown: the shutdown flag rejects new
//! invocations, in-flight work gets a fixed grace period, then teardown runs
//! (cache clear, metrics final flush) and the loop exits.

use crate::dispatcher::{CallToolRequest, Dispatcher};
use crate::state::ServerState;
use dispatch_config::constants::SHUTDOWN_GRACE_PERIOD;
use dispatch_core::CallToolResult;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// I/O failure on the transport
    #[error("Transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// An inbound request frame
#[derive(Debug, Deserialize)]
struct FrameRequest {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

/// The stdio server
pub struct Server {
    state: ServerState,
    dispatcher: Dispatcher,
}

impl Server {
    /// Create a server over shared state
    #[must_use]
    pub fn new(state: ServerState) -> Self {
        let dispatcher = Dispatcher::new(state.clone());
        Self { state, dispatcher }
    }

    /// Run until stdin closes or a termination signal arrives.
    ///
    /// # Errors
    /// Returns `ServerError::Io` on transport failure.
    pub async fn run(self) -> Result<(), ServerError> {
        let stdin = BufReader::new(tokio::io::stdin());
        self.run_with_io(stdin, tokio::io::stdout(), shutdown_signal())
            .await
    }

    /// Run over explicit I/O and a custom shutdown future (used by tests)
    ///
    /// # Errors
    /// Returns `ServerError::Io` on transport failure.
    pub async fn run_with_io<R, W, F>(
        self,
        reader: R,
        mut writer: W,
        shutdown: F,
    ) -> Result<(), ServerError>
    where
        R: tokio::io::AsyncBufRead + Unpin,
        W: tokio::io::AsyncWrite + Unpin,
        F: std::future::Future<Output = ()>,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let mut lines = reader.lines();

        info!(tools = self.state.registry.len(), "Server listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                maybe_line = lines.next_line() => {
                    match maybe_line {
                        Ok(Some(line)) => {
                            if line.trim().is_empty() {
                                continue;
                            }
                            let dispatcher = self.dispatcher.clone();
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                let response = handle_frame(&dispatcher, &line).await;
                                tx.send(response.to_string()).ok();
                            });
                        }
                        Ok(None) => {
                            info!("Input stream closed, shutting down");
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to read input frame");
                        }
                    }
                }
                Some(response) = rx.recv() => {
                    writer.write_all(response.as_bytes()).await?;
                    writer.write_all(b"\n").await?;
                    writer.flush().await?;
                }
                () = &mut shutdown => {
                    info!("Termination signal received, starting graceful shutdown");
                    break;
                }
            }
        }

        self.state.begin_shutdown();

        // let in-flight invocations finish
        tokio::time::sleep(SHUTDOWN_GRACE_PERIOD).await;

        // drain responses produced during the grace period
        drop(tx);
        while let Some(response) = rx.recv().await {
            writer.write_all(response.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        writer.flush().await?;

        self.state.cleanup().await;
        info!("Graceful shutdown completed");

        Ok(())
    }
}

/// Handle one frame, always producing a response value
async fn handle_frame(dispatcher: &Dispatcher, line: &str) -> Value {
    let frame: FrameRequest = match serde_json::from_str(line) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "Malformed request frame");
            let envelope = CallToolResult::error(format!("Malformed request: {e}"));
            return json!({"result": envelope});
        }
    };

    debug!(method = %frame.method, "Handling frame");

    let result = match frame.method.as_str() {
        "tools/list" => json!(dispatcher.list_tools()),
        // empty collections keep clients that probe these methods happy
        "resources/list" => json!({"resources": []}),
        "prompts/list" => json!({"prompts": []}),
        "tools/call" => {
            let request: CallToolRequest = match serde_json::from_value(frame.params) {
                Ok(request) => request,
                Err(e) => {
                    let envelope =
                        CallToolResult::error(format!("Malformed request: {e}"));
                    return respond(frame.id, json!(envelope));
                }
            };
            json!(dispatcher.dispatch(&request).await)
        }
        other => {
            let envelope = CallToolResult::error(format!("Unknown method: {other}"));
            json!(envelope)
        }
    };

    respond(frame.id, result)
}

fn respond(id: Option<Value>, result: Value) -> Value {
    match id {
        Some(id) => json!({"id": id, "result": result}),
        None => json!({"result": result}),
    }
}

/// Resolve when SIGINT or SIGTERM arrives
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C");
        }
        () = terminate => {
            info!("Received SIGTERM");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_config::Settings;
    use dispatch_core::ApiKey;

    fn state() -> ServerState {
        ServerState::builder(Settings::with_api_key(ApiKey::new("gsk-test").unwrap()))
            .build()
            .expect("state")
    }

    async fn roundtrip(input: &str) -> Vec<Value> {
        let server = Server::new(state());
        let reader = BufReader::new(input.as_bytes());
        let mut output = Vec::new();

        server
            .run_with_io(reader, &mut output, std::future::pending())
            .await
            .expect("run");

        String::from_utf8(output)
            .expect("utf8")
            .lines()
            .map(|line| serde_json::from_str(line).expect("valid response JSON"))
            .collect()
    }

    #[tokio::test]
    async fn test_tools_list_frame() {
        let responses = roundtrip("{\"id\": 1, \"method\": \"tools/list\"}\n").await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], json!(1));
        assert_eq!(responses[0]["result"]["tools"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_malformed_frame_yields_error_envelope() {
        let responses = roundtrip("this is not json\n").await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["result"]["isError"], json!(true));
    }

    #[tokio::test]
    async fn test_unknown_method_yields_error_envelope() {
        let responses = roundtrip("{\"id\": 7, \"method\": \"tools/destroy\"}\n").await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], json!(7));
        assert_eq!(responses[0]["result"]["isError"], json!(true));
    }

    #[tokio::test]
    async fn test_probe_methods_return_empty_collections() {
        let responses = roundtrip(
            "{\"id\": 1, \"method\": \"resources/list\"}\n{\"id\": 2, \"method\": \"prompts/list\"}\n",
        )
        .await;

        assert_eq!(responses.len(), 2);
        for response in &responses {
            let result = &response["result"];
            assert!(
                result["resources"] == json!([]) || result["prompts"] == json!([])
            );
        }
    }

    #[tokio::test]
    async fn test_call_with_malformed_params_yields_error_envelope() {
        let responses =
            roundtrip("{\"id\": 2, \"method\": \"tools/call\", \"params\": {\"no_name\": true}}\n")
                .await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["result"]["isError"], json!(true));
    }
}
