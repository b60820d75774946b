//! MCP tool handlers over the daemon components.
//!
//! Pure reads answer straight from the capture store; anything the page has to do is queued in
//! the pending-query registry and answered with a correlation ID.

mod analyze;
mod args;
mod commands;
mod configure;
mod generate;
mod interact;
mod observe;
mod schemas;

use std::sync::Arc;

use async_trait::async_trait;
use gasoline_core_types::{ErrorCode, ToolError, ToolResult};
use gasoline_mcp::{AdapterError, AdapterResult, ToolCall, ToolDescriptor, ToolDispatcher, ToolOutcome};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::daemon::Daemon;
use args::Args;

pub const TOOL_NAMES: [&str; 5] = ["observe", "analyze", "generate", "configure", "interact"];

pub struct GasolineTools {
    daemon: Arc<Daemon>,
}

impl GasolineTools {
    pub fn new(daemon: Arc<Daemon>) -> Self {
        Self { daemon }
    }
}

#[async_trait]
impl ToolDispatcher for GasolineTools {
    fn tools(&self) -> Vec<ToolDescriptor> {
        schemas::descriptors()
    }

    #[instrument(skip_all, fields(tool = %call.name, client = %call.client_id))]
    async fn call(&self, call: ToolCall) -> AdapterResult<ToolOutcome> {
        let daemon = self.daemon.as_ref();
        let args = Args::new(&call.arguments);
        let result = match call.name.as_str() {
            "observe" => observe::run(daemon, &call, args),
            "analyze" => analyze::run(daemon, &call, args).await,
            "generate" => generate::run(daemon, args),
            "configure" => configure::run(daemon, args),
            "interact" => interact::run(daemon, &call, args).await,
            other => return Err(AdapterError::UnknownTool(other.to_string())),
        };
        if let Err(err) = &result {
            if err.code == ErrorCode::Internal {
                warn!(%err, "tool handler failed");
                daemon
                    .warnings()
                    .push(format!("internal error in {}: {}", call.name, err.message));
            } else {
                debug!(code = %err.code, message = %err.message, "tool call rejected");
            }
        }
        Ok(ToolOutcome::from_result(result).with_warnings(daemon.drain_warnings()))
    }
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> ToolResult<Value> {
    serde_json::to_value(value)
        .map_err(|err| ToolError::internal(format!("response encoding failed: {err}")))
}
