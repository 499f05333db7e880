//! Assembles a [`Pipeline`] from configuration.

use advisor_adapters::build_adapter;
use advisor_config::{AgentRole, AppConfig, Language, ResolvedAgent};
use advisor_core::error::Error;
use advisor_core::provider::Provider;
use advisor_core::session::InMemorySessionStore;
use advisor_core::tool::ToolRegistry;
use advisor_guardrails::SafetyGate;
use advisor_providers::{ExpertConsultTool, ProviderAgent};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use crate::controller::Pipeline;
use crate::panel::EvaluatorPanel;
use crate::prompts;

/// Resolve a role, filling in built-in instructions when none are configured.
fn resolve(config: &AppConfig, role: AgentRole, language: Language) -> Result<ResolvedAgent, Error> {
    let mut resolved = config.resolve_agent(role)?;
    if resolved.instructions.trim().is_empty() {
        resolved.instructions = prompts::default_instructions(role, language);
    }
    Ok(resolved)
}

/// Build every stage on top of one shared completion capability.
///
/// The `consult_expert` tool is available to any role that lists it; the
/// expert itself gets no tools.
pub fn build_pipeline(config: &AppConfig, provider: Arc<dyn Provider>) -> Result<Pipeline, Error> {
    let language = config.pipeline.language;
    let rounds = config.pipeline.max_tool_rounds;

    let expert = ProviderAgent::from_resolved(
        &resolve(config, AgentRole::Expert, language)?,
        Arc::clone(&provider),
        &ToolRegistry::new(),
        rounds,
    );
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(ExpertConsultTool::new(
        Arc::new(expert),
        Arc::new(InMemorySessionStore::new()),
    )));

    let initial = resolve(config, AgentRole::Initial, language)?;
    let adapter = build_adapter(config, Arc::clone(&provider), &initial, &tools)?;

    let gate = SafetyGate::from_config(&config.guardrails, Arc::clone(&provider), &config.agent_defaults.model)?;

    let mut panel = EvaluatorPanel::new(Duration::from_secs(config.pipeline.panel_timeout_secs));
    for role in AgentRole::EVALUATORS {
        let agent = ProviderAgent::from_resolved(&resolve(config, role, language)?, Arc::clone(&provider), &tools, rounds);
        panel = panel.with_member(prompts::evaluator_label(role, language), Arc::new(agent));
    }

    let final_agent = ProviderAgent::from_resolved(&resolve(config, AgentRole::Final, language)?, provider, &tools, rounds);

    let mut pipeline = Pipeline::new(gate, adapter, panel, Arc::new(final_agent), language);
    if let Some(message) = config.pipeline.refusal_message.as_deref().filter(|m| !m.trim().is_empty()) {
        pipeline = pipeline.with_refusal_message(message);
    }

    info!(
        mode = %pipeline.adapter_mode(),
        evaluators = pipeline.panel().len(),
        checks = pipeline.gate().len(),
        panel_timeout_secs = config.pipeline.panel_timeout_secs,
        "Pipeline ready"
    );
    Ok(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_config::CheckConfig;
    use advisor_core::AdapterMode;
    use advisor_core::error::ProviderError;
    use advisor_core::provider::{ProviderRequest, ProviderResponse};
    use async_trait::async_trait;

    struct Unused;

    #[async_trait]
    impl Provider for Unused {
        fn name(&self) -> &str {
            "unused"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("unused".into()))
        }
    }

    #[test]
    fn default_config_builds_five_evaluators() {
        let pipeline = build_pipeline(&AppConfig::default(), Arc::new(Unused)).unwrap();
        assert_eq!(pipeline.adapter_mode(), AdapterMode::Direct);
        assert_eq!(
            pipeline.panel().labels(),
            vec!["A1 - Estructura", "A2 - Precisión", "A3 - Enfoque", "A4 - Referencias", "A5 - Temporal"]
        );
        assert_eq!(pipeline.panel().timeout(), Duration::from_secs(45));
        assert!(pipeline.gate().is_empty());
    }

    #[test]
    fn invalid_check_fails_the_build() {
        let mut config = AppConfig::default();
        config.guardrails.checks.push(CheckConfig {
            name: "bad".into(),
            kind: "pattern".into(),
            terms: vec![],
            patterns: vec!["(".into()],
            model: None,
            instructions: None,
            threshold: 0.5,
            enabled: true,
        });
        assert!(build_pipeline(&config, Arc::new(Unused)).is_err());
    }

    #[test]
    fn english_labels() {
        let mut config = AppConfig::default();
        config.pipeline.language = Language::En;
        let pipeline = build_pipeline(&config, Arc::new(Unused)).unwrap();
        assert_eq!(pipeline.panel().labels()[4], "A5 - Temporal validity");
        assert_eq!(pipeline.language(), Language::En);
    }

    #[test]
    fn blank_instructions_get_defaults() {
        let resolved = resolve(&AppConfig::default(), AgentRole::Focus, Language::Es).unwrap();
        assert!(resolved.instructions.contains("responde exactamente a la pregunta"));
    }
}
