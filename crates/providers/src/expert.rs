//! `consult_expert` tool: asks the expert agent a sub-question in an
//! isolated session that is always torn down afterwards.

use async_trait::async_trait;
use advisor_core::agent::AgentCapability;
use advisor_core::error::{Error, ToolError};
use advisor_core::message::Message;
use advisor_core::session::{SessionStore, with_scoped_session};
use advisor_core::tool::{Tool, ToolResult};
use std::sync::Arc;
use tracing::{debug, warn};

pub const EXPERT_TOOL_NAME: &str = "consult_expert";

/// Returned to the calling agent when the expert cannot answer, so the
/// calling agent can carry on.
pub const EXPERT_UNAVAILABLE: &str =
    "The expert could not be consulted right now. Continue with the information already available.";

pub struct ExpertConsultTool {
    expert: Arc<dyn AgentCapability>,
    sessions: Arc<dyn SessionStore>,
}

impl ExpertConsultTool {
    pub fn new(expert: Arc<dyn AgentCapability>, sessions: Arc<dyn SessionStore>) -> Self {
        Self { expert, sessions }
    }

    async fn consult(&self, query: String) -> Result<String, Error> {
        let sessions = Arc::clone(&self.sessions);
        let expert = Arc::clone(&self.expert);

        with_scoped_session(Arc::clone(&self.sessions), |session_id| async move {
            sessions.append(&session_id, Message::user(query)).await?;
            let history = sessions.messages(&session_id).await?;
            let output = expert.run(&history).await?;
            sessions
                .append(&session_id, Message::assistant(&output.text).from_agent(expert.label()))
                .await?;
            Ok(output.text)
        })
        .await
    }
}

#[async_trait]
impl Tool for ExpertConsultTool {
    fn name(&self) -> &str {
        EXPERT_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Ask the domain expert a focused sub-question about sustainability due diligence regulation."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The question for the expert" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, call_id: &str, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("'query' must be a non-empty string".into()))?
            .to_string();

        debug!(call_id, "Consulting expert");
        match self.consult(query).await {
            Ok(answer) => Ok(ToolResult::ok(call_id, answer)),
            Err(e) => {
                warn!(call_id, error = %e, "Expert consultation failed");
                Ok(ToolResult::failed(call_id, EXPERT_UNAVAILABLE))
            }
        }
    }
}
