//! Builds the shared completion capability from configuration.

use advisor_config::AppConfig;
use advisor_core::error::ProviderError;
use advisor_core::provider::Provider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::RetryProvider;

/// The completion capability every agent shares: an OpenAI-compatible
/// client wrapped in bounded retries when `max_retries > 0`.
pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let settings = &config.provider;
    let api_key = settings.api_key.clone().unwrap_or_default();
    if api_key.is_empty() {
        warn!(provider = %settings.name, "No API key configured; requests will be sent unauthenticated");
    }

    let base: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::new(
        &settings.name,
        &settings.api_url,
        api_key,
        Duration::from_secs(settings.request_timeout_secs),
    )?);

    info!(
        provider = %settings.name,
        api_url = %settings.api_url,
        max_retries = settings.max_retries,
        "Completion provider ready"
    );

    if settings.max_retries == 0 {
        return Ok(base);
    }
    Ok(Arc::new(RetryProvider::new(base, settings.max_retries)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_defaults() {
        let provider = build_provider(&AppConfig::default()).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn zero_retries_skips_wrapper() {
        let mut config = AppConfig::default();
        config.provider.name = "lmstudio".into();
        config.provider.max_retries = 0;
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.name(), "lmstudio");
    }
}
