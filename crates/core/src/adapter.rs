//! Completion adapters: the pluggable backend that answers a single query.
//!
//! Exactly one adapter is active per deployment. It is chosen once at
//! startup from configuration and used by the pipeline's draft stage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::citation::Citation;
use crate::error::AdapterError;
use crate::message::{Message, SessionId};

/// The closed set of adapter variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterMode {
    /// One hosted conversational agent, called directly
    #[default]
    #[serde(alias = "openai_single_assistant", alias = "openai")]
    Direct,
    /// A remote policy/tool server reached over HTTP
    #[serde(alias = "onprem_mcp_server", alias = "mcp")]
    Remote,
    /// A small agent network with one entry node
    #[serde(alias = "openai_agent_network", alias = "agents")]
    Network,
}

impl AdapterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Remote => "remote",
            Self::Network => "network",
        }
    }

    /// Parse a mode string, including the legacy deployment names.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "direct" | "openai_single_assistant" | "openai" => Some(Self::Direct),
            "remote" | "onprem_mcp_server" | "mcp" => Some(Self::Remote),
            "network" | "openai_agent_network" | "agents" => Some(Self::Network),
            _ => None,
        }
    }
}

impl std::fmt::Display for AdapterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything an adapter may use to answer one question.
#[derive(Debug, Clone)]
pub struct AdapterRequest {
    /// The (possibly guardrail-rewritten) question
    pub query: String,
    pub user_id: String,
    pub session_id: SessionId,
    pub context: serde_json::Map<String, serde_json::Value>,

    /// Prior conversation, oldest first, ending with the question itself
    pub history: Vec<Message>,
}

impl AdapterRequest {
    pub fn new(query: impl Into<String>, user_id: impl Into<String>, session_id: SessionId) -> Self {
        let query = query.into();
        Self {
            history: vec![Message::user(query.clone())],
            query,
            user_id: user_id.into(),
            session_id,
            context: serde_json::Map::new(),
        }
    }

    pub fn with_context(mut self, context: serde_json::Map<String, serde_json::Value>) -> Self {
        self.context = context;
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    /// Context keys in sorted order, as forwarded in request metadata.
    pub fn context_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.context.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// What an adapter returns for one query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdapterOutput {
    pub response_text: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<serde_json::Map<String, serde_json::Value>>,
}

#[async_trait]
pub trait CompletionAdapter: Send + Sync {
    fn mode(&self) -> AdapterMode;

    /// Answer one query. Timeouts and upstream failures come back typed.
    async fn generate(&self, request: &AdapterRequest) -> std::result::Result<AdapterOutput, AdapterError>;

    /// Release owned network resources. Later `generate` calls may fail
    /// with [`AdapterError::Closed`].
    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_mode_names_parse() {
        assert_eq!(AdapterMode::parse("onprem_mcp_server"), Some(AdapterMode::Remote));
        assert_eq!(AdapterMode::parse("OPENAI_AGENT_NETWORK"), Some(AdapterMode::Network));
        assert_eq!(AdapterMode::parse("direct"), Some(AdapterMode::Direct));
        assert_eq!(AdapterMode::parse("carrier-pigeon"), None);
    }

    #[test]
    fn legacy_mode_names_deserialize() {
        let mode: AdapterMode = serde_json::from_str("\"openai_single_assistant\"").unwrap();
        assert_eq!(mode, AdapterMode::Direct);
    }

    #[test]
    fn context_keys_are_sorted() {
        let mut ctx = serde_json::Map::new();
        ctx.insert("sector".into(), "textil".into());
        ctx.insert("country".into(), "ES".into());
        let req = AdapterRequest::new("q", "u1", SessionId::new()).with_context(ctx);
        assert_eq!(req.context_keys(), vec!["country", "sector"]);
        assert_eq!(req.history.len(), 1);
    }
}
