//! `advisor config`: configuration inspection.

use advisor_config::AppConfig;
use advisor_core::AdapterMode;
use std::path::Path;

pub fn show(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_with_env(path)?;
    println!("{}", config.to_redacted_toml()?);
    Ok(())
}

pub fn check(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_with_env(path)?;
    for line in summary(&config) {
        println!("{line}");
    }
    for warning in warnings(&config) {
        println!("warning: {warning}");
    }
    Ok(())
}

fn summary(config: &AppConfig) -> Vec<String> {
    let adapter = match config.adapter.mode {
        AdapterMode::Remote => format!(
            "remote ({})",
            config.adapter.remote.base_url.as_deref().unwrap_or_default()
        ),
        mode => mode.to_string(),
    };
    vec![
        "Configuration OK".to_string(),
        format!("  provider:  {} ({})", config.provider.name, config.provider.api_url),
        format!("  model:     {}", config.agent_defaults.model),
        format!("  adapter:   {adapter}"),
        format!("  language:  {:?}", config.pipeline.language),
        format!("  panel:     {}s budget", config.pipeline.panel_timeout_secs),
        format!("  checks:    {}", config.guardrails.checks.iter().filter(|c| c.enabled).count()),
        format!("  gateway:   {}:{}", config.gateway.host, config.gateway.port),
    ]
}

fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();
    if config.provider.api_key.is_none() {
        warnings.push("no provider API key (set ADVISOR_API_KEY or OPENAI_API_KEY)");
    }
    if config.adapter.mode == AdapterMode::Remote && config.adapter.remote.api_key.is_none() {
        warnings.push("remote adapter has no API key (set MCP_API_KEY)");
    }
    if config.guardrails.checks.iter().all(|c| !c.enabled) {
        warnings.push("no safety checks enabled; every question reaches the pipeline");
    }
    if config.gateway.enable_admin_routes && config.gateway.host == "0.0.0.0" {
        warnings.push("admin routes are exposed on a public bind address");
    }
    warnings
}
