//! Agent-network variant.
//!
//! A workflow definition names its nodes and one entry point. The adapter
//! resolves the entry node, hands it to a [`WorkflowExecutor`], and
//! validates whatever payload comes back like any other answer payload.

use async_trait::async_trait;
use advisor_config::{AppConfig, ResolvedAgent};
use advisor_core::adapter::{AdapterMode, AdapterOutput, AdapterRequest, CompletionAdapter};
use advisor_core::error::AdapterError;
use advisor_core::provider::Provider;
use advisor_core::tool::ToolRegistry;
use advisor_providers::ProviderAgent;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use crate::direct::request_metadata;
use crate::payload::parse_answer_payload;

/// Node graph with a designated entry point.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowDefinition {
    pub entrypoint: String,
    #[serde(default)]
    pub nodes: BTreeMap<String, Value>,
}

/// The resolved entry node of a workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryNode {
    pub name: String,
    /// From `model`, `agent_id` or `assistant_id`, in that order
    pub model: Option<String>,
    pub instructions: Option<String>,
}

impl WorkflowDefinition {
    pub fn parse(raw: &str) -> Result<Self, AdapterError> {
        let definition: Self = serde_json::from_str(raw)
            .map_err(|e| AdapterError::NotConfigured(format!("invalid workflow definition: {e}")))?;
        if definition.entrypoint.trim().is_empty() {
            return Err(AdapterError::NotConfigured("workflow entrypoint is empty".into()));
        }
        Ok(definition)
    }

    /// Inline `workflow_json` wins over `workflow_path`.
    pub fn from_config(config: &AppConfig) -> Result<Self, AdapterError> {
        let network = &config.adapter.network;
        if let Some(raw) = network.workflow_json.as_deref().filter(|s| !s.trim().is_empty()) {
            return Self::parse(raw);
        }
        let Some(relative) = network.workflow_path.as_deref() else {
            return Err(AdapterError::NotConfigured(
                "network adapter requires workflow_json or workflow_path".into(),
            ));
        };
        let path = config
            .resolve_relative(relative)
            .map_err(|e| AdapterError::NotConfigured(e.to_string()))?;
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            AdapterError::NotConfigured(format!("cannot read workflow {}: {e}", path.display()))
        })?;
        Self::parse(&raw)
    }

    pub fn entry_node(&self) -> EntryNode {
        let node = self.nodes.get(&self.entrypoint);
        if node.is_none() {
            warn!(entrypoint = %self.entrypoint, "Workflow entry node has no configuration, using agent defaults");
        }
        let field = |key: &str| {
            node.and_then(|n| n.get(key))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        EntryNode {
            name: self.entrypoint.clone(),
            model: field("model").or_else(|| field("agent_id")).or_else(|| field("assistant_id")),
            instructions: field("instructions"),
        }
    }
}

/// Runs the network from its entry node and returns the raw answer payload.
#[async_trait]
pub trait WorkflowExecutor: Send + Sync {
    async fn execute(&self, entry: &EntryNode, request: &AdapterRequest) -> Result<Value, AdapterError>;
}

/// Executes only the entry node, as a provider-backed agent.
pub struct EntryNodeExecutor {
    provider: Arc<dyn Provider>,
    base: ResolvedAgent,
    tools: ToolRegistry,
    max_tool_rounds: u32,
}

impl EntryNodeExecutor {
    /// `base` supplies everything the entry node does not override.
    pub fn new(provider: Arc<dyn Provider>, base: ResolvedAgent, tools: ToolRegistry, max_tool_rounds: u32) -> Self {
        Self {
            provider,
            base,
            tools,
            max_tool_rounds,
        }
    }
}

#[async_trait]
impl WorkflowExecutor for EntryNodeExecutor {
    async fn execute(&self, entry: &EntryNode, request: &AdapterRequest) -> Result<Value, AdapterError> {
        let mut resolved = self.base.clone();
        if let Some(model) = &entry.model {
            resolved.model = model.clone();
        }
        if let Some(instructions) = &entry.instructions {
            resolved.instructions = instructions.clone();
        }

        let agent = ProviderAgent::from_resolved(&resolved, Arc::clone(&self.provider), &self.tools, self.max_tool_rounds);
        let mut metadata = request_metadata(request, AdapterMode::Network);
        metadata.insert("entrypoint".into(), json!(entry.name));

        let output = agent.run_with_metadata(&request.history, metadata).await?;
        Ok(json!({
            "response_text": output.text,
            "debug": {"entrypoint": entry.name, "model": resolved.model, "tool_calls": output.tool_calls_made}
        }))
    }
}

pub struct NetworkAdapter {
    entry: EntryNode,
    executor: Arc<dyn WorkflowExecutor>,
}

impl NetworkAdapter {
    pub fn new(workflow: &WorkflowDefinition, executor: Arc<dyn WorkflowExecutor>) -> Self {
        Self {
            entry: workflow.entry_node(),
            executor,
        }
    }

    pub fn entry(&self) -> &EntryNode {
        &self.entry
    }
}

#[async_trait]
impl CompletionAdapter for NetworkAdapter {
    fn mode(&self) -> AdapterMode {
        AdapterMode::Network
    }

    async fn generate(&self, request: &AdapterRequest) -> Result<AdapterOutput, AdapterError> {
        debug!(entrypoint = %self.entry.name, session_id = %request.session_id, "Running agent network");
        let payload = self.executor.execute(&self.entry, request).await?;
        parse_answer_payload(payload, "workflow executor")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_config::AgentRole;
    use advisor_core::error::ProviderError;
    use advisor_core::message::{Message, SessionId};
    use advisor_core::provider::{ProviderRequest, ProviderResponse};
    use std::sync::Mutex;

    struct RecordingProvider {
        models: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Provider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.models.lock().unwrap().push(request.model.clone());
            Ok(ProviderResponse {
                message: Message::assistant("respuesta de red"),
                usage: None,
                model: request.model,
            })
        }
    }

    struct CannedExecutor(Value);

    #[async_trait]
    impl WorkflowExecutor for CannedExecutor {
        async fn execute(&self, _entry: &EntryNode, _request: &AdapterRequest) -> Result<Value, AdapterError> {
            Ok(self.0.clone())
        }
    }

    fn request() -> AdapterRequest {
        AdapterRequest::new("q", "u1", SessionId::new())
    }

    #[test]
    fn entry_model_prefers_model_then_agent_id() {
        let wf = WorkflowDefinition::parse(
            r#"{"entrypoint":"composer","nodes":{"composer":{"agent_id":"asst_1","instructions":"Compose."}}}"#,
        )
        .unwrap();
        let entry = wf.entry_node();
        assert_eq!(entry.model.as_deref(), Some("asst_1"));
        assert_eq!(entry.instructions.as_deref(), Some("Compose."));

        let wf = WorkflowDefinition::parse(
            r#"{"entrypoint":"c","nodes":{"c":{"model":"gpt-4o","assistant_id":"asst_2"}}}"#,
        )
        .unwrap();
        assert_eq!(wf.entry_node().model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn missing_entry_node_has_no_overrides() {
        let wf = WorkflowDefinition::parse(r#"{"entrypoint":"composer","nodes":{}}"#).unwrap();
        let entry = wf.entry_node();
        assert_eq!(entry.name, "composer");
        assert!(entry.model.is_none());
    }

    #[test]
    fn invalid_definitions_are_rejected() {
        assert!(WorkflowDefinition::parse("not json").is_err());
        assert!(WorkflowDefinition::parse(r#"{"entrypoint":"  "}"#).is_err());
    }

    #[test]
    fn workflow_path_is_read_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("workflow.json"),
            r#"{"entrypoint":"router","nodes":{"router":{"model":"gpt-4o"}}}"#,
        )
        .unwrap();
        let mut config = AppConfig::default();
        config.base_dir = Some(dir.path().to_path_buf());
        config.adapter.network.workflow_path = Some("workflow.json".into());

        let wf = WorkflowDefinition::from_config(&config).unwrap();
        assert_eq!(wf.entrypoint, "router");
    }

    #[tokio::test]
    async fn entry_executor_uses_node_model() {
        let provider = Arc::new(RecordingProvider { models: Mutex::new(Vec::new()) });
        let base = AppConfig::default().resolve_agent(AgentRole::Initial).unwrap();
        let executor = Arc::new(EntryNodeExecutor::new(provider.clone(), base, ToolRegistry::new(), 2));
        let wf = WorkflowDefinition::parse(r#"{"entrypoint":"composer","nodes":{"composer":{"model":"gpt-4o"}}}"#)
            .unwrap();

        let out = NetworkAdapter::new(&wf, executor).generate(&request()).await.unwrap();
        assert_eq!(out.response_text, "respuesta de red");
        assert!(out.citations.is_empty());
        assert_eq!(out.debug.unwrap()["entrypoint"], "composer");
        assert_eq!(provider.models.lock().unwrap().as_slice(), ["gpt-4o"]);
    }

    #[tokio::test]
    async fn executor_citations_are_validated() {
        let wf = WorkflowDefinition::parse(r#"{"entrypoint":"x"}"#).unwrap();
        let adapter = NetworkAdapter::new(
            &wf,
            Arc::new(CannedExecutor(json!({"response_text": "t", "citations": {"url": "https://a"}}))),
        );
        let out = adapter.generate(&request()).await.unwrap();
        assert!(out.citations.is_empty());
    }
}
