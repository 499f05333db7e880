//! Provider-backed agent with a tool round-trip loop.
//!
//! The agent prepends its instructions, calls the completion capability,
//! and whenever the capability asks for tool invocations it runs them,
//! appends the results, and resumes. After `max_tool_rounds` round-trips
//! one last call is made without tools so the capability must answer in
//! text.

use async_trait::async_trait;
use advisor_config::ResolvedAgent;
use advisor_core::agent::{AgentCapability, AgentOutput};
use advisor_core::error::ProviderError;
use advisor_core::message::Message;
use advisor_core::provider::{Provider, ProviderRequest};
use advisor_core::tool::{ToolCall, ToolRegistry};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ProviderAgent {
    label: String,
    provider: Arc<dyn Provider>,
    model: String,
    instructions: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: ToolRegistry,
    max_tool_rounds: u32,
    structured: bool,
}

impl ProviderAgent {
    pub fn new(label: impl Into<String>, provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            provider,
            model: model.into(),
            instructions: String::new(),
            temperature: 0.2,
            max_tokens: None,
            tools: ToolRegistry::new(),
            max_tool_rounds: 4,
            structured: false,
        }
    }

    /// Build from a resolved role, granting only the tools the role lists.
    pub fn from_resolved(
        resolved: &ResolvedAgent,
        provider: Arc<dyn Provider>,
        available_tools: &ToolRegistry,
        max_tool_rounds: u32,
    ) -> Self {
        Self::new(resolved.role.key(), provider, &resolved.model)
            .with_instructions(&resolved.instructions)
            .with_temperature(resolved.temperature)
            .with_max_tokens(resolved.max_tokens)
            .with_tools(available_tools.subset(&resolved.tools))
            .with_max_tool_rounds(max_tool_rounds)
            .structured(resolved.structured)
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Extract a JSON object from the final text into `AgentOutput::structured`.
    pub fn structured(mut self, structured: bool) -> Self {
        self.structured = structured;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run with caller metadata forwarded on every completion request.
    pub async fn run_with_metadata(
        &self,
        messages: &[Message],
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<AgentOutput, ProviderError> {
        let mut history = Vec::with_capacity(messages.len() + 1);
        if !self.instructions.trim().is_empty() {
            history.push(Message::system(&self.instructions));
        }
        history.extend(messages.iter().cloned());

        let definitions = self.tools.definitions();
        let mut round = 0;
        let mut tool_calls_made = 0;

        loop {
            let offer_tools = !definitions.is_empty() && round < self.max_tool_rounds;
            let request = ProviderRequest::new(&self.model, history.clone())
                .with_temperature(self.temperature)
                .with_max_tokens(self.max_tokens)
                .with_tools(if offer_tools { definitions.clone() } else { Vec::new() })
                .with_metadata(metadata.clone());

            debug!(agent = %self.label, round, messages = history.len(), "Agent completion round");
            let response = self.provider.complete(request).await?;

            if !offer_tools || !response.wants_tools() {
                if response.wants_tools() {
                    warn!(agent = %self.label, "Tool calls requested after the tool budget, ignoring");
                }
                return Ok(self.finish(response.message.content, tool_calls_made));
            }

            let calls = response.message.tool_calls.clone();
            history.push(response.message);

            for tc in &calls {
                tool_calls_made += 1;
                let output = match serde_json::from_str::<serde_json::Value>(&tc.arguments) {
                    Ok(arguments) => {
                        let call = ToolCall {
                            id: tc.id.clone(),
                            name: tc.name.clone(),
                            arguments,
                        };
                        match self.tools.execute(&call).await {
                            Ok(result) => result.output,
                            Err(e) => {
                                warn!(agent = %self.label, tool = %tc.name, error = %e, "Tool execution failed");
                                format!("Error: {e}")
                            }
                        }
                    }
                    Err(e) => format!("Error: invalid JSON arguments for {}: {e}", tc.name),
                };
                history.push(Message::tool_result(&tc.id, output));
            }

            round += 1;
        }
    }

    fn finish(&self, text: String, tool_calls_made: usize) -> AgentOutput {
        let structured = if self.structured {
            let parsed = extract_json_object(&text);
            if parsed.is_none() {
                debug!(agent = %self.label, "No JSON object in structured agent output");
            }
            parsed
        } else {
            None
        };
        AgentOutput {
            text,
            structured,
            tool_calls_made,
        }
    }
}

#[async_trait]
impl AgentCapability for ProviderAgent {
    fn label(&self) -> &str {
        &self.label
    }

    async fn run(&self, messages: &[Message]) -> Result<AgentOutput, ProviderError> {
        self.run_with_metadata(messages, serde_json::Map::new()).await
    }
}

/// Find the JSON object in a model reply, tolerating code fences and
/// surrounding prose. Returns `None` unless the result is an object.
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    if let Ok(value @ serde_json::Value::Object(_)) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&trimmed[start..=end]) {
        Ok(value @ serde_json::Value::Object(_)) => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::error::ToolError;
    use advisor_core::message::MessageToolCall;
    use advisor_core::provider::ProviderResponse;
    use advisor_core::tool::{Tool, ToolResult};
    use std::sync::Mutex;

    /// Replays scripted responses and records every request.
    struct ScriptedProvider {
        responses: Mutex<Vec<ProviderResponse>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(mut responses: Vec<ProviderResponse>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ProviderError::InvalidResponse("script exhausted".into()))
        }
    }

    fn text(content: &str) -> ProviderResponse {
        ProviderResponse {
            message: Message::assistant(content),
            usage: None,
            model: "m".into(),
        }
    }

    fn tool_call(id: &str, args: &str) -> ProviderResponse {
        ProviderResponse {
            message: Message::assistant_tool_calls(
                "",
                vec![MessageToolCall {
                    id: id.into(),
                    name: "lookup".into(),
                    arguments: args.into(),
                }],
            ),
            usage: None,
            model: "m".into(),
        }
    }

    struct LookupTool;

    #[async_trait]
    impl Tool for LookupTool {
        fn name(&self) -> &str {
            "lookup"
        }
        fn description(&self) -> &str {
            "Looks up a regulation"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {"q": {"type": "string"}}})
        }
        async fn execute(&self, call_id: &str, args: serde_json::Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok(call_id, format!("found {}", args["q"].as_str().unwrap_or("?"))))
        }
    }

    fn registry() -> ToolRegistry {
        let mut r = ToolRegistry::new();
        r.register(Arc::new(LookupTool));
        r
    }

    #[tokio::test]
    async fn plain_text_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![text("Borrador")]));
        let agent = ProviderAgent::new("initial", provider.clone(), "m").with_instructions("Eres un asesor.");

        let out = agent.run(&[Message::user("q")]).await.unwrap();
        assert_eq!(out.text, "Borrador");
        assert_eq!(out.tool_calls_made, 0);

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].messages[0].content, "Eres un asesor.");
        assert!(requests[0].tools.is_empty());
    }

    #[tokio::test]
    async fn tool_round_trip_feeds_results_back() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call("c1", r#"{"q":"CSDDD"}"#),
            text("Respuesta con herramienta"),
        ]));
        let agent = ProviderAgent::new("initial", provider.clone(), "m").with_tools(registry());

        let out = agent.run(&[Message::user("q")]).await.unwrap();
        assert_eq!(out.text, "Respuesta con herramienta");
        assert_eq!(out.tool_calls_made, 1);

        let requests = provider.requests.lock().unwrap();
        let last = requests[1].messages.last().unwrap();
        assert_eq!(last.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(last.content, "found CSDDD");
    }

    #[tokio::test]
    async fn tool_budget_forces_text_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call("c1", "{}"),
            tool_call("c2", "{}"),
            text("final"),
        ]));
        let agent = ProviderAgent::new("initial", provider.clone(), "m")
            .with_tools(registry())
            .with_max_tool_rounds(2);

        let out = agent.run(&[Message::user("q")]).await.unwrap();
        assert_eq!(out.text, "final");
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests[2].tools.is_empty());
    }

    #[tokio::test]
    async fn bad_tool_arguments_are_reported_to_the_model() {
        let provider = Arc::new(ScriptedProvider::new(vec![tool_call("c1", "not json"), text("ok")]));
        let agent = ProviderAgent::new("initial", provider.clone(), "m").with_tools(registry());

        agent.run(&[Message::user("q")]).await.unwrap();
        let requests = provider.requests.lock().unwrap();
        let tool_msg = requests[1].messages.last().unwrap();
        assert!(tool_msg.content.starts_with("Error: invalid JSON arguments"));
    }

    #[tokio::test]
    async fn structured_agent_extracts_fenced_json() {
        let reply = "```json\n{\"veredicto\": \"APROBADO\", \"mejoras\": \"\"}\n```";
        let provider = Arc::new(ScriptedProvider::new(vec![text(reply)]));
        let agent = ProviderAgent::new("structure", provider, "m").structured(true);

        let out = agent.run(&[Message::user("q")]).await.unwrap();
        assert_eq!(out.structured.unwrap()["veredicto"], "APROBADO");
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let agent = ProviderAgent::new("initial", provider, "m");
        assert!(agent.run(&[Message::user("q")]).await.is_err());
    }

    #[test]
    fn extract_json_object_cases() {
        assert!(extract_json_object("{\"a\": 1}").is_some());
        assert!(extract_json_object("Veredicto: {\"a\": 1} fin").is_some());
        assert!(extract_json_object("[1, 2]").is_none());
        assert!(extract_json_object("RECHAZADO sin json").is_none());
        assert!(extract_json_object("} backwards {").is_none());
    }
}
