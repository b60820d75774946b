//! Commands handed to the extension through the pending-query registry.

use std::time::Duration;

use gasoline_core_types::{ToolError, ToolResult};
use gasoline_mcp::ToolCall;
use gasoline_pending_queries::{NewQuery, QuerySnapshot, QueryState};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::args::Args;
use crate::daemon::Daemon;

/// Arguments that steer queuing and are not forwarded to the extension.
pub(crate) const CONTROL_KEYS: [&str; 5] = ["what", "action", "wait", "timeout_ms", "tab_id"];

/// Queues `kind` with `params`, returning the correlation ID, or waits for the outcome when the
/// caller passed `wait: true`.
pub(crate) async fn queue_command(
    daemon: &Daemon,
    call: &ToolCall,
    args: Args<'_>,
    kind: &str,
    params: Value,
) -> ToolResult<Value> {
    let tab_id = match args.u64("tab_id")? {
        Some(tab) => tab,
        None => daemon.capture().session().tracked_tab.unwrap_or(0),
    };
    let requested = args.u64("timeout_ms")?.map(Duration::from_millis);
    let wait = args.bool("wait")?;
    let registry = daemon.queries();
    let timeout = registry.config().effective_timeout(requested);
    let query = registry
        .create(NewQuery::new(kind, params).on_tab(tab_id), Some(timeout), &call.client_id)
        .map_err(ToolError::from)?;
    info!(id = %query.correlation_id, kind, tab_id, "command queued");

    if !wait {
        return Ok(json!({
            "correlation_id": query.correlation_id,
            "status": "queued",
            "hint": "observe {what: \"command_result\", correlation_id} for the outcome",
        }));
    }

    let waited = tokio::select! {
        snapshot = registry.wait(&query.correlation_id, &call.client_id, timeout) => snapshot,
        _ = call.cancel.cancelled() => {
            debug!(id = %query.correlation_id, "command wait cancelled");
            return Err(ToolError::timeout("wait cancelled because the daemon is shutting down")
                .with_hint("the command stays queued; read it later with observe command_result"));
        }
    };
    render_outcome(waited.map_err(ToolError::from)?)
}

/// Terminal outcomes become results; anything still open is a timeout.
pub(crate) fn render_outcome(snapshot: QuerySnapshot) -> ToolResult<Value> {
    let id = snapshot.query.correlation_id.clone();
    match snapshot.state {
        QueryState::Completed => Ok(json!({
            "correlation_id": id,
            "status": "complete",
            "result": snapshot.result.unwrap_or(Value::Null),
        })),
        QueryState::Failed => Ok(json!({
            "correlation_id": id,
            "status": "failed",
            "error": snapshot.error.unwrap_or_default(),
        })),
        QueryState::Expired => Err(ToolError::expired(format!(
            "command {id} expired: {}",
            snapshot.error.as_deref().unwrap_or("no response from the extension")
        ))
        .with_param("correlation_id")),
        QueryState::Queued | QueryState::Taken => Err(ToolError::timeout(format!(
            "command {id} is still {}",
            snapshot.state.as_str()
        ))
        .with_hint("poll observe command_result with the same correlation_id")),
    }
}

/// `command_result` view: terminal outcome or the current state without failing.
pub(crate) fn describe(snapshot: QuerySnapshot) -> ToolResult<Value> {
    if snapshot.state.is_terminal() {
        return render_outcome(snapshot);
    }
    Ok(json!({
        "correlation_id": snapshot.query.correlation_id,
        "status": "pending",
        "state": snapshot.state.as_str(),
        "queue_position": snapshot.queue_position,
        "created_at": snapshot.query.created_at,
        "deadline": snapshot.query.deadline,
    }))
}
