use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use gasoline_capture_store::SecurityMode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::server::{AppState, HttpError};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/settings", post(settings_handler))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsPayload {
    page_url: Option<String>,
    /// `0` stops tracking a specific tab.
    tab_id: Option<u64>,
    pilot_enabled: Option<bool>,
    security_mode: Option<String>,
}

#[instrument(skip_all)]
async fn settings_handler(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, HttpError> {
    let payload: SettingsPayload = serde_json::from_slice(&body)
        .map_err(|err| HttpError::bad_request(format!("invalid settings payload: {err}")))?;
    let mode = payload
        .security_mode
        .as_deref()
        .map(str::parse::<SecurityMode>)
        .transpose()
        .map_err(|err| HttpError::bad_request(err.to_string()))?;

    let capture = state.daemon.capture();
    capture.mark_extension_contact();
    if let Some(url) = payload.page_url {
        capture.set_page_url(url);
    }
    if let Some(tab) = payload.tab_id {
        capture.set_tracked_tab((tab != 0).then_some(tab));
    }
    if let Some(enabled) = payload.pilot_enabled {
        if enabled != capture.pilot_enabled() {
            info!(enabled, "ai web pilot toggled");
        }
        capture.set_pilot_enabled(enabled);
    }
    if let Some(mode) = mode {
        capture.set_security_mode(mode);
    }
    Ok(Json(json!({ "status": "ok", "session": capture.session() })))
}
