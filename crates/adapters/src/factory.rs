//! Selects and builds the active completion adapter from configuration.

use advisor_config::{AppConfig, ResolvedAgent};
use advisor_core::adapter::{AdapterMode, CompletionAdapter};
use advisor_core::error::AdapterError;
use advisor_core::provider::Provider;
use advisor_core::tool::ToolRegistry;
use advisor_providers::ProviderAgent;
use std::sync::Arc;
use tracing::info;
use crate::direct::DirectAdapter;
use crate::network::{EntryNodeExecutor, NetworkAdapter, WorkflowDefinition};
use crate::remote::RemoteAdapter;

/// Build the single adapter this deployment uses.
///
/// `initial` is the resolved drafting role and `tools` the tools it may be
/// granted; the remote variant ignores `provider`, `initial` and `tools`.
pub fn build_adapter(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    initial: &ResolvedAgent,
    tools: &ToolRegistry,
) -> Result<Arc<dyn CompletionAdapter>, AdapterError> {
    let max_tool_rounds = config.pipeline.max_tool_rounds;
    let adapter: Arc<dyn CompletionAdapter> = match config.adapter.mode {
        AdapterMode::Direct => {
            let agent = ProviderAgent::from_resolved(initial, provider, tools, max_tool_rounds);
            info!(mode = "direct", model = %agent.model(), "Completion adapter ready");
            Arc::new(DirectAdapter::new(agent))
        }
        AdapterMode::Remote => {
            let remote = RemoteAdapter::from_config(&config.adapter.remote)?;
            info!(mode = "remote", endpoint = %remote.endpoint(), "Completion adapter ready");
            Arc::new(remote)
        }
        AdapterMode::Network => {
            let workflow = WorkflowDefinition::from_config(config)?;
            let executor = Arc::new(EntryNodeExecutor::new(
                provider,
                initial.clone(),
                tools.clone(),
                max_tool_rounds,
            ));
            let network = NetworkAdapter::new(&workflow, executor);
            info!(mode = "network", entrypoint = %network.entry().name, "Completion adapter ready");
            Arc::new(network)
        }
    };
    Ok(adapter)
}
