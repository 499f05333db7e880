//! Direct variant: one provider-backed agent answers the query in-process.

use async_trait::async_trait;
use advisor_core::adapter::{AdapterMode, AdapterOutput, AdapterRequest, CompletionAdapter};
use advisor_core::error::AdapterError;
use advisor_providers::ProviderAgent;
use serde_json::{Map, Value, json};
use tracing::debug;

/// Forward the caller's identity and context shape as request metadata.
pub(crate) fn request_metadata(request: &AdapterRequest, mode: AdapterMode) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("user_id".into(), json!(request.user_id));
    metadata.insert("session_id".into(), json!(request.session_id.as_str()));
    metadata.insert("mode".into(), json!(mode.as_str()));
    if !request.context.is_empty() {
        metadata.insert("context_keys".into(), json!(request.context_keys()));
    }
    metadata
}

pub struct DirectAdapter {
    agent: ProviderAgent,
}

impl DirectAdapter {
    pub fn new(agent: ProviderAgent) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl CompletionAdapter for DirectAdapter {
    fn mode(&self) -> AdapterMode {
        AdapterMode::Direct
    }

    async fn generate(&self, request: &AdapterRequest) -> Result<AdapterOutput, AdapterError> {
        let metadata = request_metadata(request, self.mode());
        debug!(
            session_id = %request.session_id,
            model = %self.agent.model(),
            "Invoking direct agent"
        );
        let output = self.agent.run_with_metadata(&request.history, metadata).await?;
        Ok(AdapterOutput {
            response_text: output.text,
            citations: Vec::new(),
            debug: None,
        })
    }
}
