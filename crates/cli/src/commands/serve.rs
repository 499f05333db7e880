//! `advisor serve`: start the HTTP gateway.

use advisor_config::ConfigCache;
use advisor_gateway::RuntimeCache;
use std::path::Path;
use std::sync::Arc;

pub async fn run(config_path: &Path, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Arc::new(RuntimeCache::new(ConfigCache::new(config_path)));
    advisor_gateway::serve(runtime, port_override).await
}
