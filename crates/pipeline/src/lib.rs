//! # Advisor Pipeline
//!
//! The critique-and-synthesis flow behind every advisor answer:
//!
//! ```text
//! question ─▶ SafetyGate ─▶ DraftStage ─▶ EvaluatorPanel ─▶ citations ─▶ SynthesisStage
//!                 │            (adapter)    5 evaluators       dedup        final agent
//!                 ▼                         parallel, 45 s
//!              refusal                      └▶ sequential fallback
//! ```
//!
//! Stages run strictly in order for one request. Only the panel fans out.

pub mod builder;
pub mod citations;
pub mod controller;
pub mod draft;
pub mod panel;
pub mod prompts;
pub mod synthesis;
pub mod verdict;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use builder::build_pipeline;
pub use citations::{aggregate, aggregate_with_seed, dedupe};
pub use controller::{Pipeline, PipelineOutcome, PipelineRequest, PipelineResult};
pub use draft::{Draft, DraftStage};
pub use panel::{EvaluatorPanel, PanelMode, PanelOutcome};
pub use prompts::user_facing_error;
pub use synthesis::{SynthesisInput, SynthesisStage};
pub use verdict::{ParsedVerdict, parse_evaluator_output};
