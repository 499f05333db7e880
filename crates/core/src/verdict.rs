//! Evaluator verdicts.

use serde::{Deserialize, Serialize};
use crate::citation::Citation;

/// An evaluator's binary judgment on the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Approved,
    Rejected,
}

impl Verdict {
    /// Strict parse of a structured verdict field (English or Spanish).
    /// Anything unrecognized is `None`; callers decide the default.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "APPROVED" | "APROBADO" | "APROBADA" => Some(Self::Approved),
            "REJECTED" | "RECHAZADO" | "RECHAZADA" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One panel member's result. Exactly one per member per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorVerdict {
    pub agent_label: String,
    pub verdict: Verdict,
    pub improvement_notes: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl EvaluatorVerdict {
    /// The verdict recorded when an evaluator call failed outright.
    pub fn failed(agent_label: impl Into<String>) -> Self {
        Self {
            agent_label: agent_label.into(),
            verdict: Verdict::Rejected,
            improvement_notes: String::new(),
            citations: Vec::new(),
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.verdict == Verdict::Rejected
    }
}
