//! # Advisor Adapters
//!
//! The three [`CompletionAdapter`](advisor_core::CompletionAdapter)
//! variants and the factory that picks one from configuration:
//!
//! - [`DirectAdapter`]: one provider-backed agent, called in-process.
//! - [`RemoteAdapter`]: `POST {base_url}/advisor/answer` on a remote server.
//! - [`NetworkAdapter`]: an agent network entered through one node.

pub mod direct;
pub mod factory;
pub mod network;
pub mod payload;
pub mod remote;

pub use direct::DirectAdapter;
pub use factory::build_adapter;
pub use network::{EntryNode, EntryNodeExecutor, NetworkAdapter, WorkflowDefinition, WorkflowExecutor};
pub use payload::parse_answer_payload;
pub use remote::RemoteAdapter;
