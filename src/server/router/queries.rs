use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gasoline_core_types::ToolError;
use gasoline_pending_queries::{QueryError, Transition};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::server::{AppState, HttpError};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/queries/poll", get(poll_handler).post(poll_handler))
        .route("/queries/result", post(result_handler))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PollParams {
    #[serde(rename = "type")]
    kind: Option<String>,
    tab_id: u64,
    wait_ms: u64,
}

/// Hands out the oldest matching query, waiting up to `wait_ms` for one to arrive.
#[instrument(skip_all, fields(kind, tab_id))]
async fn poll_handler(
    State(state): State<AppState>,
    Query(params): Query<PollParams>,
) -> Result<Response, HttpError> {
    let kind = params
        .kind
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| HttpError::missing("type"))?;
    let span = tracing::Span::current();
    span.record("kind", kind.as_str());
    span.record("tab_id", params.tab_id);

    let daemon = &state.daemon;
    daemon.capture().mark_extension_contact();
    let max_wait = daemon.config().server.max_poll_wait_ms;
    let wait = Duration::from_millis(params.wait_ms.min(max_wait));
    let registry = daemon.queries();
    let query = if wait.is_zero() {
        registry.take(&kind, params.tab_id)
    } else {
        registry.wait_for_pending(&kind, params.tab_id, wait).await
    };
    Ok(match query {
        Some(query) => {
            debug!(id = %query.correlation_id, "query handed to extension");
            Json(query).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

#[derive(Debug, Deserialize)]
struct ResultPayload {
    #[serde(alias = "id")]
    correlation_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[instrument(skip_all, fields(id))]
async fn result_handler(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, HttpError> {
    let payload: ResultPayload = serde_json::from_slice(&body)
        .map_err(|err| HttpError::bad_request(format!("invalid result payload: {err}")))?;
    tracing::Span::current().record("id", payload.correlation_id.as_str());
    let daemon = &state.daemon;
    daemon.capture().mark_extension_contact();
    let transition = daemon
        .queries()
        .apply_status(
            &payload.correlation_id,
            payload.status.as_deref().unwrap_or(""),
            payload.result,
            payload.error,
        )
        .map_err(|err| match err {
            QueryError::NotFound(id) => HttpError::not_found(format!("query '{id}' not found")),
            other => HttpError::from(ToolError::from(other)),
        })?;
    let (applied, status) = match transition {
        Transition::Applied(s) => (true, s.as_str()),
        Transition::AlreadyTerminal(s) => (false, s.as_str()),
        Transition::StillPending => (false, "pending"),
    };
    Ok(Json(json!({
        "correlation_id": payload.correlation_id,
        "applied": applied,
        "state": status,
    })))
}
