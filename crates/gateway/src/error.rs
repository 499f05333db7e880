//! Caller-facing error bodies.

use advisor_config::Language;
use advisor_core::error::{Error, ErrorKind};
use advisor_pipeline::user_facing_error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use tracing::error;

/// `{"error": {"kind", "message", "correlation_id"}}` with a matching status.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a ApiError,
}

/// 504 for timeouts, 502 for other upstream failures, 500 otherwise.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::UpstreamFailure => StatusCode::BAD_GATEWAY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    /// Classify a pipeline error, log it under a fresh correlation id, and
    /// keep only a short retry-oriented message for the caller.
    pub fn from_pipeline(err: &Error, language: Language) -> Self {
        let kind = err.kind();
        let correlation_id = uuid::Uuid::new_v4().to_string();
        error!(correlation_id = %correlation_id, kind = %kind, error = %err, "Advisor request failed");
        Self {
            status: status_for(kind),
            kind: kind.as_str(),
            message: user_facing_error(kind, language).to_string(),
            correlation_id: Some(correlation_id),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            kind: "unauthorized",
            message: message.into(),
            correlation_id: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_request",
            message: message.into(),
            correlation_id: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            kind: "not_found",
            message: "Not found".into(),
            correlation_id: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn kind(&self) -> &str {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: &self })).into_response()
    }
}
