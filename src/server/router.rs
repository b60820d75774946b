use axum::extract::{DefaultBodyLimit, State};
use axum::http::Method;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};

mod ingest;
mod queries;
mod recordings;
mod settings;

use super::state::AppState;

/// Every extension route plus `POST /mcp`, bound to `state`.
pub fn build_router(state: AppState) -> Router {
    let server_cfg = &state.daemon.config().server;
    let body_limit = server_cfg.max_body_bytes;
    let recording_limit = server_cfg.max_recording_bytes;
    let mcp = gasoline_mcp::http::router(state.mcp.clone()).layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .route("/health", get(health_handler))
        .merge(ingest::router())
        .merge(queries::router())
        .merge(settings::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .merge(recordings::router().layer(DefaultBodyLimit::max(recording_limit)))
        .with_state(state)
        .merge(mcp)
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.daemon.health())
}
