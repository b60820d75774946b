use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Abstract error categories surfaced to tool callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidParam,
    MissingParam,
    UnknownMode,
    NotInitialized,
    QueueFull,
    Timeout,
    Expired,
    DisabledFeature,
    PathNotAllowed,
    Internal,
    SsrfBlocked,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidParam => "invalid_param",
            ErrorCode::MissingParam => "missing_param",
            ErrorCode::UnknownMode => "unknown_mode",
            ErrorCode::NotInitialized => "not_initialized",
            ErrorCode::QueueFull => "queue_full",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Expired => "expired",
            ErrorCode::DisabledFeature => "disabled_feature",
            ErrorCode::PathNotAllowed => "path_not_allowed",
            ErrorCode::Internal => "internal",
            ErrorCode::SsrfBlocked => "ssrf_blocked",
        }
    }

    /// Whether a caller may reasonably retry the same request later.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::QueueFull | ErrorCode::Timeout | ErrorCode::Expired
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure returned by tool handlers and rendered with `isError: true`.
#[derive(Clone, Debug, PartialEq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ToolError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub valid_values: Vec<String>,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

pub type ToolResult<T> = Result<T, ToolError>;

impl ToolError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            param: None,
            valid_values: Vec::new(),
            retryable: code.retryable(),
            hint: None,
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }

    pub fn with_valid_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn invalid_param(param: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParam, message).with_param(param)
    }

    pub fn missing_param(param: &str) -> Self {
        Self::new(
            ErrorCode::MissingParam,
            format!("required parameter '{param}' is missing"),
        )
        .with_param(param)
    }

    pub fn unknown_mode(param: &str, value: &str, valid: &[&str]) -> Self {
        Self::new(
            ErrorCode::UnknownMode,
            format!("unknown {param} '{value}'"),
        )
        .with_param(param)
        .with_valid_values(valid.iter().copied())
    }

    pub fn not_initialized(component: &str) -> Self {
        Self::new(
            ErrorCode::NotInitialized,
            format!("{component} is not initialized"),
        )
    }

    pub fn queue_full(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::QueueFull, message)
            .with_hint("poll existing command results before queuing more")
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    pub fn expired(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Expired, message)
    }

    /// `knob` names the flag or setting that enables the feature.
    pub fn disabled_feature(feature: &str, knob: &str) -> Self {
        Self::new(
            ErrorCode::DisabledFeature,
            format!("{feature} is disabled"),
        )
        .with_hint(format!("enable it with {knob}"))
    }

    pub fn path_not_allowed(path: &str) -> Self {
        Self::new(
            ErrorCode::PathNotAllowed,
            format!("path '{path}' is outside the permitted directory"),
        )
        .with_param("path")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn ssrf_blocked(host: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::SsrfBlocked,
            format!("outbound request to '{host}' refused: {reason}"),
        )
        .with_hint("allow the host with --ssrf-allow-host")
    }
}
