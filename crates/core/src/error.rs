//! Error types for the advisor domain.
//!
//! Each bounded context has its own `thiserror` enum; [`Error`] wraps them
//! all and [`Error::kind`] folds any of them into the three caller-facing
//! categories the HTTP surface understands.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all advisor operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Guardrail error: {0}")]
    Guardrail(#[from] GuardrailError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Caller-facing error category.
///
/// Timeouts are kept apart from other upstream failures so clients can decide
/// to retry; everything that is our own fault collapses into `Internal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UpstreamTimeout,
    UpstreamFailure,
    #[serde(rename = "internal_error")]
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpstreamTimeout => "upstream_timeout",
            Self::UpstreamFailure => "upstream_failure",
            Self::Internal => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error for the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Provider(e) => e.kind(),
            Self::Adapter(e) => e.kind(),
            Self::Guardrail(GuardrailError::Provider { source, .. }) => source.kind(),
            Self::Guardrail(GuardrailError::CheckFailed { .. }) => ErrorKind::UpstreamFailure,
            Self::Guardrail(GuardrailError::InvalidCheck { .. }) => ErrorKind::Internal,
            Self::Tool(_)
            | Self::Session(_)
            | Self::Config { .. }
            | Self::Serialization(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

// --- Bounded context errors ---

/// Failures of the completion capability.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether a bounded retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout(_) => ErrorKind::UpstreamTimeout,
            Self::NotConfigured(_) => ErrorKind::Internal,
            _ => ErrorKind::UpstreamFailure,
        }
    }
}

/// Failures of a completion adapter.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("Upstream did not respond within {after_secs}s")]
    Timeout { after_secs: u64 },

    #[error("Upstream returned status {status_code}: {body}")]
    UpstreamStatus { status_code: u16, body: String },

    #[error("Invalid upstream payload: {0}")]
    InvalidPayload(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream produced an empty answer")]
    EmptyResponse,

    #[error("Adapter not configured: {0}")]
    NotConfigured(String),

    #[error("Adapter client already released")]
    Closed,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl AdapterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::UpstreamTimeout,
            Self::Provider(e) => e.kind(),
            Self::NotConfigured(_) => ErrorKind::Internal,
            _ => ErrorKind::UpstreamFailure,
        }
    }
}

/// Faults raised while evaluating safety checks. A fault is never a pass.
#[derive(Debug, Clone, Error)]
pub enum GuardrailError {
    #[error("Invalid check '{name}': {reason}")]
    InvalidCheck { name: String, reason: String },

    #[error("Check '{check}' failed: {reason}")]
    CheckFailed { check: String, reason: String },

    #[error("Check '{check}' could not reach its classifier: {source}")]
    Provider {
        check: String,
        #[source]
        source: ProviderError,
    },
}

/// A turn sink could not store a record.
#[derive(Debug, Clone, Error)]
pub enum TurnLogError {
    #[error("Failed to encode turn record: {0}")]
    Encode(String),

    #[error("Failed to write turn record to {path}: {reason}")]
    Write { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session storage error: {0}")]
    Storage(String),
}
