//! Safety gate for incoming questions.
//!
//! Checks are declared in TOML under `[[guardrails.checks]]` and run in
//! order before any generation happens:
//!
//! ```toml
//! [[guardrails.checks]]
//! name = "off-topic-weapons"
//! kind = "keywords"
//! terms = ["explosivos", "armas"]
//!
//! [[guardrails.checks]]
//! name = "pii"
//! kind = "redact"
//! ```
//!
//! A tripped check stops the request with a refusal. A check that cannot
//! reach a decision is an error, never a pass.

mod checks;
mod gate;
mod model;

pub use checks::{CheckOutcome, ClassifierCheck, KeywordCheck, PatternCheck, RedactCheck, SafetyCheck};
pub use gate::{GateReport, SafetyGate};
pub use model::{CheckKind, CheckSpec};
