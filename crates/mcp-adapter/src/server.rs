use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};

use crate::errors::{AdapterError, AdapterResult};
use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};
use crate::ports::{ToolCall, ToolDispatcher};
use crate::trace::McpTracer;

/// Newest first; the first entry is offered when the client asks for something else.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 2] = ["2025-06-18", "2024-11-05"];

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    #[serde(skip)]
    pub instructions: Option<String>,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Default, Deserialize)]
struct InitializeParams {
    #[serde(default, rename = "protocolVersion")]
    protocol_version: Option<String>,
}

/// Transport-independent MCP method handling.
pub struct McpServer {
    info: ServerInfo,
    dispatcher: Arc<dyn ToolDispatcher>,
    shutdown: CancellationToken,
    tracer: McpTracer,
}

impl McpServer {
    pub fn new(info: ServerInfo, dispatcher: Arc<dyn ToolDispatcher>) -> Self {
        Self {
            info,
            dispatcher,
            shutdown: CancellationToken::new(),
            tracer: McpTracer::new("mcp"),
        }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Cancelling this token cancels every in-flight tool call.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Handles one raw message. `None` means nothing should be written back.
    pub async fn handle_line(&self, raw: &str, client_id: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(raw.trim()) {
            Ok(value) => value,
            Err(err) => {
                debug!(?err, "unparseable JSON-RPC message");
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    AdapterError::Parse(err.to_string()),
                ));
            }
        };
        self.handle_value(value, client_id).await
    }

    pub async fn handle_value(&self, value: Value, client_id: &str) -> Option<JsonRpcResponse> {
        let reason = match &value {
            Value::Object(_) => None,
            Value::Array(_) => Some("batch requests are not supported"),
            _ => Some("expected a JSON object"),
        };
        if let Some(reason) = reason {
            return Some(JsonRpcResponse::failure(
                Value::Null,
                AdapterError::InvalidRequest(reason.into()),
            ));
        }
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(req) => self.handle(req, client_id).await,
            Err(err) => Some(JsonRpcResponse::failure(
                id,
                AdapterError::InvalidRequest(err.to_string()),
            )),
        }
    }

    pub async fn handle(&self, req: JsonRpcRequest, client_id: &str) -> Option<JsonRpcResponse> {
        if req.jsonrpc != JSONRPC_VERSION || req.method.is_empty() {
            let id = req.id.unwrap_or(Value::Null);
            return Some(JsonRpcResponse::failure(
                id,
                AdapterError::InvalidRequest("jsonrpc must be \"2.0\" and method non-empty".into()),
            ));
        }
        if req.is_notification() {
            debug!(method = %req.method, "notification received");
            return None;
        }
        let id = req.id.clone().unwrap_or(Value::Null);
        let span = self.tracer.span(client_id, &req.method);
        let result = self.dispatch(req, client_id).instrument(span).await;
        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(err) => {
                debug!(%err, "JSON-RPC request failed");
                JsonRpcResponse::failure(id, err)
            }
        })
    }

    async fn dispatch(&self, req: JsonRpcRequest, client_id: &str) -> AdapterResult<Value> {
        match req.method.as_str() {
            "initialize" => Ok(self.initialize(req.params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.dispatcher.tools() })),
            "tools/call" => self.call_tool(req.params, client_id).await,
            other => Err(AdapterError::MethodNotFound(other.to_string())),
        }
    }

    fn initialize(&self, params: Value) -> Value {
        let params: InitializeParams = serde_json::from_value(params).unwrap_or_default();
        let negotiated = params
            .protocol_version
            .as_deref()
            .and_then(|v| SUPPORTED_PROTOCOL_VERSIONS.iter().find(|s| **s == v))
            .unwrap_or(&SUPPORTED_PROTOCOL_VERSIONS[0]);
        let mut result = json!({
            "protocolVersion": negotiated,
            "serverInfo": &self.info,
            "capabilities": { "tools": {} },
        });
        if let (Some(text), Some(obj)) = (&self.info.instructions, result.as_object_mut()) {
            obj.insert("instructions".into(), Value::String(text.clone()));
        }
        result
    }

    async fn call_tool(&self, params: Value, client_id: &str) -> AdapterResult<Value> {
        let params: CallParams =
            serde_json::from_value(params).map_err(|err| AdapterError::InvalidParams(err.to_string()))?;
        let arguments = match params.arguments {
            Value::Null => Value::Object(Map::new()),
            Value::Object(map) => Value::Object(map),
            _ => return Err(AdapterError::InvalidParams("arguments must be an object".into())),
        };
        let call = ToolCall::new(params.name, arguments)
            .with_client(client_id)
            .with_cancel(self.shutdown.child_token());
        let outcome = self.dispatcher.call(call).await?;
        serde_json::to_value(outcome).map_err(|err| AdapterError::Internal(err.to_string()))
    }
}
