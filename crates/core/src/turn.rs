//! Turn records: one per request, handed to write-only sinks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::adapter::AdapterMode;
use crate::citation::Citation;
use crate::error::{ErrorKind, TurnLogError};

/// How the request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Answered,
    Refused,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub user_message: String,

    /// Final answer, refusal text, or the caller-facing error message
    pub assistant_response: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub mode: AdapterMode,

    /// Which HTTP route (or CLI) produced the turn
    pub endpoint_source: String,
    pub outcome: TurnOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Destination for turn records. Callers never fail a request because a
/// sink failed; errors are returned only so they can be logged.
#[async_trait]
pub trait TurnSink: Send + Sync {
    fn name(&self) -> &str;

    async fn record(&self, turn: &TurnRecord) -> std::result::Result<(), TurnLogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_turn_serializes_error_fields() {
        let turn = TurnRecord {
            timestamp: Utc::now(),
            session_id: "s1".into(),
            user_id: "u1".into(),
            email: None,
            email_verified: false,
            user_message: "q".into(),
            assistant_response: "try again".into(),
            citations: vec![],
            mode: AdapterMode::Remote,
            endpoint_source: "advisor_answer".into(),
            outcome: TurnOutcome::Failed,
            error_kind: Some(ErrorKind::UpstreamTimeout),
            correlation_id: Some("c-1".into()),
        };
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["error_kind"], "upstream_timeout");
        assert_eq!(json["mode"], "remote");
        assert!(json.get("email").is_none());
    }
}
