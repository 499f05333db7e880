//! Agent capability: one configured role (draft, evaluator, synthesis, ...)
//! sitting on top of the completion capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Message;

/// What a single agent run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOutput {
    /// Final assistant text
    pub text: String,

    /// JSON object extracted from the text, for agents that answer in a
    /// structured schema; `None` when the text held no parsable object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<serde_json::Value>,

    /// Number of tool invocations executed along the way
    #[serde(default)]
    pub tool_calls_made: usize,
}

impl AgentOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait AgentCapability: Send + Sync {
    /// Role label used in logs and evaluator transcripts.
    fn label(&self) -> &str;

    /// Run the agent over the given history and return its final output.
    async fn run(&self, messages: &[Message]) -> std::result::Result<AgentOutput, ProviderError>;
}
