use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use gasoline_core_types::ToolError;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use crate::recordings::{self, RecordingError};
use crate::server::{AppState, HttpError};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/recordings/save", post(save_handler))
        .route("/recordings/reveal", post(reveal_handler))
}

/// Multipart fields: `video` (required), `metadata` (JSON text), `query_id`.
#[instrument(skip_all, fields(query_id))]
async fn save_handler(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<Value>, HttpError> {
    let mut video: Option<Bytes> = None;
    let mut metadata: Option<String> = None;
    let mut query_id: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| HttpError::bad_request(format!("invalid multipart body: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let read_err = |err: axum::extract::multipart::MultipartError| {
            HttpError::bad_request(format!("failed to read field '{name}': {err}"))
        };
        match name.as_str() {
            "video" => video = Some(field.bytes().await.map_err(read_err)?),
            "metadata" => metadata = Some(field.text().await.map_err(read_err)?),
            "query_id" => query_id = Some(field.text().await.map_err(read_err)?),
            _ => {}
        }
    }
    let video = video.ok_or_else(|| HttpError::missing("video"))?;
    let query_id = query_id.map(|q| q.trim().to_string()).filter(|q| !q.is_empty());
    if let Some(id) = &query_id {
        tracing::Span::current().record("query_id", id.as_str());
    }

    let daemon = state.daemon.clone();
    let store = daemon.recordings().clone();
    let saved = tokio::task::spawn_blocking(move || store.save(&video, metadata.as_deref()))
        .await
        .map_err(|err| {
            error!(?err, "recording save task failed");
            HttpError::internal("recording save task failed")
        })?
        .map_err(|err| match err {
            RecordingError::Io(err) => {
                error!(?err, "recording not written");
                HttpError::internal(format!("recording not written: {err}"))
            }
            other => HttpError::from(ToolError::from(other)),
        })?;

    if let Some(id) = &query_id {
        let result = json!({ "path": saved.path, "metadata_path": saved.metadata_path });
        if let Err(err) = daemon.queries().set_result(id, result) {
            warn!(%err, query_id = %id, "recording saved for unknown query");
        }
    }
    Ok(Json(json!({
        "status": "saved",
        "name": saved.name,
        "path": saved.path,
        "metadata_path": saved.metadata_path,
        "size_bytes": saved.size_bytes,
    })))
}

#[derive(Debug, Deserialize)]
struct RevealPayload {
    path: String,
}

#[instrument(skip_all)]
async fn reveal_handler(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, HttpError> {
    let payload: RevealPayload = serde_json::from_slice(&body)
        .map_err(|err| HttpError::bad_request(format!("invalid reveal payload: {err}")))?;
    let path = state
        .daemon
        .recordings()
        .resolve_reveal(&payload.path)
        .map_err(|err| HttpError::from(ToolError::from(err)))?;
    recordings::reveal(&path).await.map_err(|err| {
        error!(?err, path = %path.display(), "file manager did not start");
        HttpError::internal(format!("failed to reveal recording: {err}"))
    })?;
    info!(path = %path.display(), "recording revealed");
    Ok(Json(json!({ "status": "revealed", "path": path })))
}
