//! Scripted agents and adapters for pipeline tests.

use async_trait::async_trait;
use advisor_core::adapter::{AdapterMode, AdapterOutput, AdapterRequest, CompletionAdapter};
use advisor_core::agent::{AgentCapability, AgentOutput};
use advisor_core::citation::Citation;
use advisor_core::error::{AdapterError, ProviderError};
use advisor_core::message::Message;
use std::sync::Mutex;
use std::time::Duration;

/// An agent that answers with a fixed reply (or error), optionally after
/// a delay, and records what it was asked.
pub struct ScriptedAgent {
    label: String,
    reply: Result<String, ProviderError>,
    delay: Duration,
    first_call_delay: Option<Duration>,
    calls: Mutex<usize>,
    inputs: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedAgent {
    pub fn replying(label: &str, reply: &str) -> Self {
        Self::scripted(label, Ok(reply.to_string()))
    }

    pub fn failing(label: &str, error: ProviderError) -> Self {
        Self::scripted(label, Err(error))
    }

    fn scripted(label: &str, reply: Result<String, ProviderError>) -> Self {
        Self {
            label: label.to_string(),
            reply,
            delay: Duration::ZERO,
            first_call_delay: None,
            calls: Mutex::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sleep before the first reply only.
    pub fn with_first_call_delay(mut self, delay: Duration) -> Self {
        self.first_call_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    /// Messages received by the most recent call.
    pub fn last_input(&self) -> Option<Vec<Message>> {
        self.inputs.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl AgentCapability for ScriptedAgent {
    fn label(&self) -> &str {
        &self.label
    }

    async fn run(&self, messages: &[Message]) -> Result<AgentOutput, ProviderError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        self.inputs.lock().unwrap().push(messages.to_vec());

        let delay = match self.first_call_delay {
            Some(first) if call == 1 => first,
            _ => self.delay,
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().map(AgentOutput::text)
    }
}

/// An adapter returning a fixed output or error.
pub struct ScriptedAdapter {
    mode: AdapterMode,
    reply: Result<AdapterOutput, AdapterError>,
    calls: Mutex<Vec<AdapterRequest>>,
}

impl ScriptedAdapter {
    pub fn replying(text: &str) -> Self {
        Self {
            mode: AdapterMode::Direct,
            reply: Ok(AdapterOutput {
                response_text: text.to_string(),
                citations: Vec::new(),
                debug: None,
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mode: AdapterMode, error: AdapterError) -> Self {
        Self {
            mode,
            reply: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        if let Ok(output) = &mut self.reply {
            output.citations = citations;
        }
        self
    }

    pub fn with_mode(mut self, mode: AdapterMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<AdapterRequest> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionAdapter for ScriptedAdapter {
    fn mode(&self) -> AdapterMode {
        self.mode
    }

    async fn generate(&self, request: &AdapterRequest) -> Result<AdapterOutput, AdapterError> {
        self.calls.lock().unwrap().push(request.clone());
        self.reply.clone()
    }
}

/// Structured evaluator reply approving the draft.
pub fn approved() -> String {
    r#"{"verdict": "APPROVED", "improvement_notes": "", "citations": []}"#.to_string()
}

/// Structured evaluator reply rejecting the draft.
pub fn rejected(notes: &str, citations: serde_json::Value) -> String {
    serde_json::json!({"verdict": "REJECTED", "improvement_notes": notes, "citations": citations}).to_string()
}
