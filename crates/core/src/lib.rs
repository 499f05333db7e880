//! # Advisor Core
//!
//! Domain types, traits, and error definitions for the compliance advisor.
//! This crate knows nothing about HTTP or configuration files; it defines the
//! vocabulary every other crate implements against.
//!
//! ## Seams
//!
//! - [`Provider`]: the opaque completion capability (messages in, text or
//!   tool calls out).
//! - [`AgentCapability`]: a configured agent role built on a provider.
//! - [`CompletionAdapter`]: the pluggable backend that answers one query.
//! - [`SessionStore`]: isolated sub-conversations for tool calls.
//! - [`TurnSink`]: write-only destination for per-request turn records.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod agent;
pub mod citation;
pub mod verdict;
pub mod adapter;
pub mod session;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use error::{AdapterError, Error, ErrorKind, GuardrailError, ProviderError, Result, SessionError, ToolError, TurnLogError};
pub use message::{Conversation, Message, MessageToolCall, Role, SessionId};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
pub use agent::{AgentCapability, AgentOutput};
pub use citation::Citation;
pub use verdict::{EvaluatorVerdict, Verdict};
pub use adapter::{AdapterMode, AdapterOutput, AdapterRequest, CompletionAdapter};
pub use session::{InMemorySessionStore, SessionStore, with_scoped_session};
pub use turn::{TurnOutcome, TurnRecord, TurnSink};
