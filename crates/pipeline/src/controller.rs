//! Pipeline controller: gate → draft → panel → citations → synthesis.

use advisor_config::Language;
use advisor_core::adapter::{AdapterMode, AdapterRequest, CompletionAdapter};
use advisor_core::agent::AgentCapability;
use advisor_core::citation::Citation;
use advisor_core::error::Error;
use advisor_core::message::{Conversation, Message, SessionId};
use advisor_core::verdict::EvaluatorVerdict;
use advisor_guardrails::SafetyGate;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use crate::citations::aggregate_with_seed;
use crate::draft::DraftStage;
use crate::panel::{EvaluatorPanel, PanelMode};
use crate::prompts;
use crate::synthesis::{SynthesisInput, SynthesisStage};

/// One question, with identity already established by the caller.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub query: String,
    pub user_id: String,
    pub session_id: SessionId,
    pub context: serde_json::Map<String, serde_json::Value>,
    /// Earlier turns of the same session, oldest first
    pub history: Vec<Message>,
}

impl PipelineRequest {
    pub fn new(query: impl Into<String>, user_id: impl Into<String>, session_id: SessionId) -> Self {
        Self {
            query: query.into(),
            user_id: user_id.into(),
            session_id,
            context: serde_json::Map::new(),
            history: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: serde_json::Map<String, serde_json::Value>) -> Self {
        self.context = context;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub draft: String,
    pub evaluations: Vec<EvaluatorVerdict>,
    pub final_answer: String,
    pub citations: Vec<Citation>,
    pub panel_mode: PanelMode,
    pub adapter_mode: AdapterMode,
}

#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// The safety gate tripped; nothing was generated
    Refused {
        message: String,
        failed_checks: Vec<String>,
    },
    Answered(PipelineResult),
}

pub struct Pipeline {
    gate: SafetyGate,
    draft: DraftStage,
    panel: EvaluatorPanel,
    synthesis: SynthesisStage,
    language: Language,
    refusal_message: String,
}

impl Pipeline {
    pub fn new(
        gate: SafetyGate,
        adapter: Arc<dyn CompletionAdapter>,
        panel: EvaluatorPanel,
        final_agent: Arc<dyn AgentCapability>,
        language: Language,
    ) -> Self {
        Self {
            gate,
            draft: DraftStage::new(adapter),
            panel,
            synthesis: SynthesisStage::new(final_agent, language),
            language,
            refusal_message: prompts::refusal_message(language).to_string(),
        }
    }

    pub fn with_refusal_message(mut self, message: impl Into<String>) -> Self {
        self.refusal_message = message.into();
        self
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn adapter(&self) -> &Arc<dyn CompletionAdapter> {
        self.draft.adapter()
    }

    pub fn adapter_mode(&self) -> AdapterMode {
        self.adapter().mode()
    }

    pub fn panel(&self) -> &EvaluatorPanel {
        &self.panel
    }

    pub fn gate(&self) -> &SafetyGate {
        &self.gate
    }

    /// Release the adapter's network resources.
    pub async fn shutdown(&self) {
        self.adapter().close().await;
    }

    pub async fn answer(&self, request: PipelineRequest) -> Result<PipelineOutcome, Error> {
        let started = Instant::now();
        let session_id = request.session_id.clone();

        let report = self.gate.check(&request.query).await?;
        if report.tripwire {
            let failed_checks: Vec<String> = report.failures().iter().map(|o| o.check.clone()).collect();
            warn!(session_id = %session_id, checks = ?failed_checks, "Question refused by safety gate");
            return Ok(PipelineOutcome::Refused {
                message: self.refusal_message.clone(),
                failed_checks,
            });
        }
        let question = report.checked_text;

        let mut conversation = Conversation::seeded(session_id.clone(), request.history, &question);
        let adapter_request = AdapterRequest::new(&question, &request.user_id, session_id.clone())
            .with_context(request.context)
            .with_history(conversation.snapshot());

        let draft = self.draft.run(&adapter_request).await?;
        info!(stage = "draft", session_id = %session_id, mode = %self.adapter_mode(), "Draft stage complete");
        conversation.push(Message::assistant(&draft.text).from_agent("initial"));

        let panel = self.panel.evaluate(&conversation.snapshot()).await;
        let citations = aggregate_with_seed(&draft.citations, &panel.verdicts);

        let input = SynthesisInput {
            question,
            draft: draft.text,
            evaluations: panel.verdicts,
            citations,
        };
        let final_answer = self.synthesis.run(&input).await?;

        info!(
            session_id = %session_id,
            panel_mode = ?panel.mode,
            rejected = input.evaluations.iter().filter(|v| v.is_rejected()).count(),
            citations = input.citations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline complete"
        );

        let SynthesisInput {
            draft,
            evaluations,
            citations,
            ..
        } = input;
        Ok(PipelineOutcome::Answered(PipelineResult {
            draft,
            evaluations,
            final_answer,
            citations,
            panel_mode: panel.mode,
            adapter_mode: self.adapter_mode(),
        }))
    }
}
