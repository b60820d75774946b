use async_trait::async_trait;
use gasoline_core_types::{ToolError, ToolResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::errors::{AdapterError, AdapterResult};

pub const DEFAULT_CLIENT_ID: &str = "default";

/// One `tools/call` after framing has been stripped.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
    /// Scopes pending queries; other clients cannot read them.
    pub client_id: String,
    /// Cancelled when the transport shuts down; long waits must observe it.
    pub cancel: CancellationToken,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".into(),
            text: text.into(),
        }
    }
}

/// MCP tool result envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutcome {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ToolOutcome {
    pub fn json<T: Serialize>(data: &T) -> Self {
        match serde_json::to_string(data) {
            Ok(text) => Self {
                content: vec![ContentBlock::text(text)],
                is_error: false,
                warnings: Vec::new(),
            },
            Err(err) => Self::failure(&ToolError::internal(format!("response encoding failed: {err}"))),
        }
    }

    pub fn failure(err: &ToolError) -> Self {
        let text = serde_json::to_string(err).unwrap_or_else(|_| err.to_string());
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: true,
            warnings: Vec::new(),
        }
    }

    pub fn from_result(result: ToolResult<Value>) -> Self {
        match result {
            Ok(data) => Self::json(&data),
            Err(err) => Self::failure(&err),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    /// The first text block parsed back as JSON.
    pub fn payload(&self) -> Option<Value> {
        self.content
            .first()
            .and_then(|block| serde_json::from_str(&block.text).ok())
    }
}

/// Entry of `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    fn tools(&self) -> Vec<ToolDescriptor>;

    /// `Err` only for framing-level failures (unknown tool, malformed arguments). Handler
    /// failures come back as an outcome with `is_error` set.
    async fn call(&self, call: ToolCall) -> AdapterResult<ToolOutcome>;
}

pub struct NoopDispatcher;

#[async_trait]
impl ToolDispatcher for NoopDispatcher {
    fn tools(&self) -> Vec<ToolDescriptor> {
        Vec::new()
    }

    async fn call(&self, call: ToolCall) -> AdapterResult<ToolOutcome> {
        Err(AdapterError::UnknownTool(call.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_envelope_uses_camel_case() {
        let outcome = ToolOutcome::json(&json!({"count": 2})).with_warnings(vec!["w".into()]);
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["isError"], json!(false));
        assert_eq!(value["content"][0]["type"], json!("text"));
        assert_eq!(value["warnings"], json!(["w"]));
        assert_eq!(outcome.payload(), Some(json!({"count": 2})));
    }

    #[test]
    fn failures_carry_the_structured_error() {
        let outcome = ToolOutcome::failure(&ToolError::missing_param("what"));
        assert!(outcome.is_error);
        let payload = outcome.payload().unwrap();
        assert_eq!(payload["code"], json!("missing_param"));
        assert_eq!(payload["param"], json!("what"));
    }
}
