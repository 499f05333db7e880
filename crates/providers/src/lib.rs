//! Completion capability implementations for the advisor.
//!
//! All providers implement `advisor_core::Provider`. Agents built here
//! implement `advisor_core::AgentCapability` on top of them.

pub mod agent;
pub mod expert;
pub mod factory;
pub mod openai_compat;
pub mod retry;

pub use agent::{ProviderAgent, extract_json_object};
pub use expert::{EXPERT_TOOL_NAME, ExpertConsultTool};
pub use factory::build_provider;
pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryProvider;
