//! The evaluator panel: five critics over one immutable snapshot.
//!
//! The parallel attempt runs every member under one wall-clock budget.
//! If the budget is exceeded the attempt is dropped (cancelling in-flight
//! calls) and the members are run again one at a time, once. A member that
//! fails in either mode yields a rejected verdict with empty notes.

use advisor_core::agent::AgentCapability;
use advisor_core::message::Message;
use advisor_core::verdict::EvaluatorVerdict;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use crate::verdict::parse_evaluator_output;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelMode {
    Parallel,
    Sequential,
}

#[derive(Debug, Clone)]
pub struct PanelOutcome {
    /// One per member, in panel order
    pub verdicts: Vec<EvaluatorVerdict>,
    pub mode: PanelMode,
}

struct Member {
    label: String,
    agent: Arc<dyn AgentCapability>,
}

pub struct EvaluatorPanel {
    members: Vec<Member>,
    timeout: Duration,
}

impl EvaluatorPanel {
    pub fn new(timeout: Duration) -> Self {
        Self {
            members: Vec::new(),
            timeout,
        }
    }

    /// Append a member. Order of insertion is panel order.
    pub fn with_member(mut self, label: impl Into<String>, agent: Arc<dyn AgentCapability>) -> Self {
        self.members.push(Member {
            label: label.into(),
            agent,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn labels(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.label.as_str()).collect()
    }

    pub async fn evaluate(&self, snapshot: &[Message]) -> PanelOutcome {
        let started = Instant::now();
        let attempt = join_all(self.members.iter().map(|m| evaluate_member(m, snapshot)));

        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(verdicts) => {
                info!(
                    evaluators = verdicts.len(),
                    rejected = verdicts.iter().filter(|v| v.is_rejected()).count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Panel finished in parallel"
                );
                PanelOutcome {
                    verdicts,
                    mode: PanelMode::Parallel,
                }
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Parallel panel exceeded its budget, falling back to sequential"
                );
                let mut verdicts = Vec::with_capacity(self.members.len());
                for member in &self.members {
                    verdicts.push(evaluate_member(member, snapshot).await);
                }
                info!(
                    evaluators = verdicts.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Panel finished sequentially"
                );
                PanelOutcome {
                    verdicts,
                    mode: PanelMode::Sequential,
                }
            }
        }
    }
}

async fn evaluate_member(member: &Member, snapshot: &[Message]) -> EvaluatorVerdict {
    match member.agent.run(snapshot).await {
        Ok(output) => {
            let verdict = parse_evaluator_output(&member.label, &output);
            debug!(evaluator = %member.label, verdict = %verdict.verdict, "Evaluator finished");
            verdict
        }
        Err(e) => {
            warn!(evaluator = %member.label, error = %e, "Evaluator failed, counting as rejected");
            EvaluatorVerdict::failed(&member.label)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedAgent;
    use advisor_core::error::ProviderError;
    use advisor_core::verdict::Verdict;

    const APPROVED: &str = r#"{"verdict": "APPROVED", "improvement_notes": ""}"#;

    fn snapshot() -> Vec<Message> {
        vec![Message::user("q"), Message::assistant("draft")]
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_keeps_panel_order() {
        let slow = Arc::new(ScriptedAgent::replying("slow", APPROVED).with_delay(Duration::from_secs(5)));
        let fast = Arc::new(ScriptedAgent::replying("fast", r#"{"verdict": "REJECTED", "improvement_notes": "x"}"#));
        let panel = EvaluatorPanel::new(Duration::from_secs(45))
            .with_member("A1", slow.clone())
            .with_member("A2", fast.clone());

        let outcome = panel.evaluate(&snapshot()).await;
        assert_eq!(outcome.mode, PanelMode::Parallel);
        assert_eq!(outcome.verdicts[0].agent_label, "A1");
        assert_eq!(outcome.verdicts[0].verdict, Verdict::Approved);
        assert_eq!(outcome.verdicts[1].agent_label, "A2");
        assert_eq!(outcome.verdicts[1].verdict, Verdict::Rejected);
    }

    #[tokio::test(start_paused = true)]
    async fn member_failure_is_local() {
        let broken = Arc::new(ScriptedAgent::failing("broken", ProviderError::Network("reset".into())));
        let ok = Arc::new(ScriptedAgent::replying("ok", APPROVED));
        let panel = EvaluatorPanel::new(Duration::from_secs(45))
            .with_member("A1", broken)
            .with_member("A2", ok.clone());

        let outcome = panel.evaluate(&snapshot()).await;
        assert_eq!(outcome.mode, PanelMode::Parallel);
        assert_eq!(outcome.verdicts[0], EvaluatorVerdict::failed("A1"));
        assert_eq!(outcome.verdicts[1].verdict, Verdict::Approved);
        assert_eq!(ok.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_falls_back_to_sequential_once() {
        // Slow only on its first call, so the sequential pass completes.
        let stuck = Arc::new(
            ScriptedAgent::replying("stuck", APPROVED).with_first_call_delay(Duration::from_secs(60)),
        );
        let quick = Arc::new(ScriptedAgent::replying("quick", APPROVED));
        let panel = EvaluatorPanel::new(Duration::from_secs(45))
            .with_member("A1", quick.clone())
            .with_member("A2", stuck.clone());

        let outcome = panel.evaluate(&snapshot()).await;
        assert_eq!(outcome.mode, PanelMode::Sequential);
        assert_eq!(outcome.verdicts.len(), 2);
        assert!(outcome.verdicts.iter().all(|v| v.verdict == Verdict::Approved));
        assert_eq!(quick.calls(), 2);
        assert_eq!(stuck.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_mode_is_best_effort() {
        let stuck = Arc::new(
            ScriptedAgent::failing("stuck", ProviderError::Timeout("read".into()))
                .with_delay(Duration::from_secs(50)),
        );
        let quick = Arc::new(ScriptedAgent::replying("quick", APPROVED));
        let panel = EvaluatorPanel::new(Duration::from_secs(45))
            .with_member("A1", stuck.clone())
            .with_member("A2", quick.clone());

        let outcome = panel.evaluate(&snapshot()).await;
        assert_eq!(outcome.mode, PanelMode::Sequential);
        assert_eq!(outcome.verdicts[0], EvaluatorVerdict::failed("A1"));
        assert_eq!(outcome.verdicts[1].verdict, Verdict::Approved);
        assert_eq!(stuck.calls(), 2);
    }

    #[tokio::test]
    async fn empty_panel_yields_no_verdicts() {
        let outcome = EvaluatorPanel::new(Duration::from_secs(1)).evaluate(&snapshot()).await;
        assert!(outcome.verdicts.is_empty());
        assert_eq!(outcome.mode, PanelMode::Parallel);
    }
}
