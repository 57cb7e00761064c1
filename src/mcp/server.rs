//! MCP tool server wrapping the action dispatcher.
//!
//! Requests are admitted one at a time: the admission lock is held for the
//! whole request, so the pointer and keyboard never see interleaved actions
//! even if a transport delivers concurrently. `shutdown` is the single
//! teardown hook for every transport.
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::Engine as _;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::errors::{DeskError, DeskResult};
use crate::executor::action::ActionKind;
use crate::executor::dispatcher::{ActionDispatcher, ActionOutput};
use crate::executor::input::InputBackend;
use crate::mcp::transport::McpTransport;
use crate::mcp::types::{
    Content, RpcRequest, RpcResponse, ToolCallParams, ToolResult, INTERNAL_ERROR, INVALID_PARAMS,
    INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};

pub struct McpServer {
    dispatcher: ActionDispatcher,
    input: Arc<dyn InputBackend>,
    tool_name: String,
    admission: Mutex<()>,
    accepting: AtomicBool,
}

impl McpServer {
    pub fn new(dispatcher: ActionDispatcher, input: Arc<dyn InputBackend>, tool_name: String) -> Self {
        Self {
            dispatcher,
            input,
            tool_name,
            admission: Mutex::new(()),
            accepting: AtomicBool::new(true),
        }
    }

    pub fn tool_definition(&self) -> Value {
        let actions: Vec<&str> = ActionKind::ALL.iter().map(|k| k.name()).collect();
        json!({
            "name": self.tool_name,
            "description": "Control the desktop with the mouse and keyboard and take screenshots. \
                Coordinates are pixels in the space of the most recent screenshot \
                (its image_width x image_height). `key` takes a chord such as \"ctrl+shift+t\"; \
                `scroll` takes text of the form direction[:amount].",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "action": { "type": "string", "enum": actions },
                    "coordinate": {
                        "type": "array",
                        "items": { "type": "integer", "minimum": 0 },
                        "minItems": 2,
                        "maxItems": 2,
                        "description": "[x, y] in screenshot pixels"
                    },
                    "text": { "type": "string" }
                },
                "required": ["action"]
            }
        })
    }

    /// Runs one action and wraps the outcome in the tool-result envelope.
    /// Failures become an `isError` result; the server stays ready.
    pub async fn call_tool(&self, arguments: &Value) -> ToolResult {
        match self.run_action(arguments).await {
            Ok(output) => into_tool_result(&output),
            Err(e) => {
                tracing::warn!(error = %e, "action failed");
                ToolResult::failure(e.to_string())
            }
        }
    }

    async fn run_action(&self, arguments: &Value) -> DeskResult<ActionOutput> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(DeskError::ShuttingDown);
        }
        let _admitted = self.admission.lock().await;
        // Shutdown may have started while we were queued.
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(DeskError::ShuttingDown);
        }
        self.dispatcher.dispatch_arguments(arguments).await
    }

    /// Stop accepting, wait for the in-flight request, release the backend.
    /// Safe to call more than once; only the first call does anything.
    pub async fn shutdown(&self) {
        if !self.accepting.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::info!("shutting down; draining in-flight request");
        let _drained = self.admission.lock().await;
        if let Err(e) = self.input.release_all().await {
            tracing::warn!(error = %e, "failed to release held input");
        }
        tracing::info!("shutdown complete");
    }

    /// Handles one raw message; `None` means no reply is due (notification).
    pub async fn handle_message(&self, raw: &str) -> Option<RpcResponse> {
        let request: RpcRequest = match serde_json::from_str(raw) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable message");
                return Some(RpcResponse::error(Value::Null, PARSE_ERROR, format!("parse error: {e}")));
            }
        };
        let Some(id) = request.id.clone() else {
            tracing::debug!(method = %request.method, "notification");
            return None;
        };
        if request.jsonrpc.as_deref().is_some_and(|v| v != "2.0") {
            return Some(RpcResponse::error(id, INVALID_REQUEST, "unsupported jsonrpc version"));
        }

        let response = match request.method.as_str() {
            "initialize" => RpcResponse::ok(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            ),
            "ping" => RpcResponse::ok(id, json!({})),
            "tools/list" => RpcResponse::ok(id, json!({ "tools": [self.tool_definition()] })),
            "tools/call" => {
                let params: ToolCallParams = match serde_json::from_value(request.params) {
                    Ok(p) => p,
                    Err(e) => {
                        return Some(RpcResponse::error(id, INVALID_PARAMS, format!("invalid params: {e}")))
                    }
                };
                if params.name != self.tool_name {
                    return Some(RpcResponse::error(
                        id,
                        INVALID_PARAMS,
                        format!("unknown tool: {}", params.name),
                    ));
                }
                let result = self.call_tool(&params.arguments).await;
                match serde_json::to_value(result) {
                    Ok(v) => RpcResponse::ok(id, v),
                    Err(e) => RpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
                }
            }
            other => RpcResponse::error(id, METHOD_NOT_FOUND, format!("method not found: {other}")),
        };
        Some(response)
    }
}

fn into_tool_result(output: &ActionOutput) -> ToolResult {
    let mut content = vec![Content::Text {
        text: output.text_payload().to_string(),
    }];
    if let ActionOutput::Screenshot(shot) = output {
        content.push(Content::Image {
            data: base64::engine::general_purpose::STANDARD.encode(&shot.image.bytes),
            mime_type: shot.image.mime_type.to_string(),
        });
    }
    ToolResult {
        content,
        is_error: false,
    }
}

/// Pumps messages until the peer hangs up. Transport failures end the loop;
/// action failures never do.
pub async fn serve<T: McpTransport>(server: &McpServer, transport: &mut T) -> DeskResult<()> {
    tracing::info!(tool = %server.tool_name, "serving");
    while let Some(raw) = transport.recv().await? {
        if let Some(response) = server.handle_message(&raw).await {
            let value = serde_json::to_value(&response)?;
            transport.send(&value).await?;
        }
    }
    tracing::info!("transport closed");
    Ok(())
}

/// Why `serve_until` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stopped {
    Disconnected,
    Interrupted,
}

/// Serves until the peer hangs up or `interrupt` resolves, then runs the
/// shutdown hook either way.
pub async fn serve_until<T, F>(
    server: &McpServer,
    transport: &mut T,
    interrupt: F,
) -> DeskResult<Stopped>
where
    T: McpTransport,
    F: Future<Output = ()>,
{
    let outcome = tokio::select! {
        res = serve(server, transport) => res.map(|()| Stopped::Disconnected),
        () = interrupt => {
            tracing::info!("interrupted");
            Ok(Stopped::Interrupted)
        }
    };
    server.shutdown().await;
    outcome
}
