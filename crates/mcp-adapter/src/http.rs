use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tracing::instrument;

use crate::ports::DEFAULT_CLIENT_ID;
use crate::server::McpServer;

/// Request header naming the calling MCP client.
pub const CLIENT_HEADER: &str = "x-gasoline-client";

pub fn router(server: Arc<McpServer>) -> Router {
    Router::new()
        .route("/mcp", post(mcp_handler))
        .with_state(server)
}

/// JSON-RPC errors travel in a 200 body; notifications get 204.
#[instrument(skip_all, fields(client))]
async fn mcp_handler(
    State(server): State<Arc<McpServer>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let client = headers
        .get(CLIENT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_CLIENT_ID)
        .to_string();
    tracing::Span::current().record("client", client.as_str());
    match server.handle_line(&body, &client).await {
        Some(resp) => Json(resp).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
