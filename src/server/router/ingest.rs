use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use gasoline_capture_store::CaptureError;
use gasoline_core_types::{
    EnhancedAction, ExtensionLog, LogEntry, NetworkBody, PerformanceSnapshot, WaterfallEntry,
    WebSocketEvent, WebSocketStatus,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, instrument};

use crate::server::{AppState, HttpError};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/logs", post(logs_handler))
        .route("/network/waterfall", post(waterfall_handler))
        .route("/network/bodies", post(bodies_handler))
        .route("/websocket", post(websocket_handler))
        .route("/websocket/status", post(websocket_status_handler))
        .route("/actions", post(actions_handler))
        .route("/performance", post(performance_handler))
        .route("/extension-logs", post(extension_logs_handler))
}

type Ack = Result<Json<Value>, HttpError>;

fn ack(received: usize) -> Ack {
    Ok(Json(json!({ "received": received })))
}

/// Accepts `{"<key>": [...]}` or a bare array.
pub(crate) fn parse_batch<T: DeserializeOwned>(body: &[u8], key: &str) -> Result<Vec<T>, HttpError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| HttpError::bad_request(format!("invalid JSON: {err}")))?;
    let items = match value {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => map.remove(key).ok_or_else(|| HttpError::missing(key))?,
        _ => {
            return Err(HttpError::bad_request(format!(
                "expected an array or an object with '{key}'"
            )))
        }
    };
    serde_json::from_value(items).map_err(|err| HttpError::bad_request(format!("invalid {key}: {err}")))
}

#[instrument(skip_all, fields(count))]
async fn logs_handler(State(state): State<AppState>, body: Bytes) -> Ack {
    let entries: Vec<LogEntry> = parse_batch(&body, "entries")?;
    tracing::Span::current().record("count", entries.len());
    let capture = state.daemon.capture();
    capture.mark_extension_contact();
    match capture.add_console_logs(entries) {
        Ok(n) => ack(n),
        Err(CaptureError::LogStore(err)) if err.is_validation() => {
            debug!(%err, "console batch rejected");
            Err(HttpError::bad_request(err.to_string()))
        }
        Err(err) => {
            error!(?err, "console batch not stored");
            Err(HttpError::internal(err.to_string()))
        }
    }
}

#[derive(Deserialize)]
struct WaterfallPayload {
    #[serde(default)]
    page_url: String,
    #[serde(default)]
    entries: Vec<WaterfallEntry>,
}

#[instrument(skip_all, fields(count))]
async fn waterfall_handler(State(state): State<AppState>, body: Bytes) -> Ack {
    let value: Value = serde_json::from_slice(&body)
        .map_err(|err| HttpError::bad_request(format!("invalid JSON: {err}")))?;
    let payload = if value.is_array() {
        WaterfallPayload {
            page_url: String::new(),
            entries: serde_json::from_value(value)
                .map_err(|err| HttpError::bad_request(format!("invalid entries: {err}")))?,
        }
    } else {
        serde_json::from_value::<WaterfallPayload>(value)
            .map_err(|err| HttpError::bad_request(format!("invalid waterfall payload: {err}")))?
    };
    tracing::Span::current().record("count", payload.entries.len());
    let daemon = &state.daemon;
    daemon.capture().mark_extension_contact();
    let page_url = if payload.page_url.is_empty() {
        daemon.capture().session().page_url.unwrap_or_default()
    } else {
        payload.page_url
    };
    ack(daemon.ingest_waterfall(&page_url, payload.entries))
}

#[instrument(skip_all, fields(count))]
async fn bodies_handler(State(state): State<AppState>, body: Bytes) -> Ack {
    let bodies: Vec<NetworkBody> = parse_batch(&body, "bodies")?;
    tracing::Span::current().record("count", bodies.len());
    state.daemon.capture().mark_extension_contact();
    ack(state.daemon.ingest_network_bodies(bodies))
}

#[instrument(skip_all, fields(count))]
async fn websocket_handler(State(state): State<AppState>, body: Bytes) -> Ack {
    let events: Vec<WebSocketEvent> = parse_batch(&body, "events")?;
    tracing::Span::current().record("count", events.len());
    let capture = state.daemon.capture();
    capture.mark_extension_contact();
    ack(capture.add_websocket_events(events))
}

#[instrument(skip_all)]
async fn websocket_status_handler(State(state): State<AppState>, body: Bytes) -> Ack {
    let updates: Vec<WebSocketStatus> = parse_batch(&body, "connections")?;
    let capture = state.daemon.capture();
    capture.mark_extension_contact();
    ack(capture.add_websocket_status(updates))
}

#[instrument(skip_all)]
async fn actions_handler(State(state): State<AppState>, body: Bytes) -> Ack {
    let actions: Vec<EnhancedAction> = parse_batch(&body, "actions")?;
    let capture = state.daemon.capture();
    capture.mark_extension_contact();
    ack(capture.record_actions(actions))
}

#[instrument(skip_all)]
async fn performance_handler(State(state): State<AppState>, body: Bytes) -> Ack {
    let snapshots: Vec<PerformanceSnapshot> = parse_batch(&body, "snapshots")?;
    let capture = state.daemon.capture();
    capture.mark_extension_contact();
    ack(capture.add_performance_snapshots(snapshots))
}

#[instrument(skip_all)]
async fn extension_logs_handler(State(state): State<AppState>, body: Bytes) -> Ack {
    let logs: Vec<ExtensionLog> = parse_batch(&body, "logs")?;
    let capture = state.daemon.capture();
    capture.mark_extension_contact();
    ack(capture.add_extension_logs(logs))
}
