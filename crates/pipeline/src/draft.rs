//! Draft stage: one call to the active completion adapter.

use advisor_core::adapter::{AdapterRequest, CompletionAdapter};
use advisor_core::citation::Citation;
use advisor_core::error::AdapterError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct Draft {
    pub text: String,
    /// Citations the backend attached to its answer, if any
    pub citations: Vec<Citation>,
    pub debug: Option<serde_json::Map<String, serde_json::Value>>,
}

pub struct DraftStage {
    adapter: Arc<dyn CompletionAdapter>,
}

impl DraftStage {
    pub fn new(adapter: Arc<dyn CompletionAdapter>) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &Arc<dyn CompletionAdapter> {
        &self.adapter
    }

    /// Produce the draft. Failure here fails the request; a blank answer
    /// counts as a failure too.
    pub async fn run(&self, request: &AdapterRequest) -> Result<Draft, AdapterError> {
        let started = Instant::now();
        let output = self.adapter.generate(request).await?;

        if output.response_text.trim().is_empty() {
            warn!(mode = %self.adapter.mode(), session_id = %request.session_id, "Adapter returned an empty draft");
            return Err(AdapterError::EmptyResponse);
        }
        debug!(
            mode = %self.adapter.mode(),
            chars = output.response_text.len(),
            citations = output.citations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Draft ready"
        );
        Ok(Draft {
            text: output.response_text,
            citations: output.citations,
            debug: output.debug,
        })
    }
}
