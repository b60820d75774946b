use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gasoline_core_types::{ErrorCode, ToolError};
use serde_json::json;

/// Rendered as `{"error": {"code", "message"}}`.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_param", message)
    }

    pub fn missing(param: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "missing_param",
            format!("required parameter '{param}' is missing"),
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ToolError> for HttpError {
    fn from(err: ToolError) -> Self {
        let status = match err.code {
            ErrorCode::InvalidParam | ErrorCode::MissingParam | ErrorCode::UnknownMode => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::PathNotAllowed | ErrorCode::SsrfBlocked | ErrorCode::DisabledFeature => {
                StatusCode::FORBIDDEN
            }
            ErrorCode::QueueFull => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::Timeout => StatusCode::REQUEST_TIMEOUT,
            ErrorCode::Expired => StatusCode::GONE,
            ErrorCode::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.code.as_str(), err.message)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        }));
        (self.status, body).into_response()
    }
}
