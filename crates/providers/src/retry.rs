//! Bounded retries for the completion capability.
//!
//! Wraps any provider and retries transient failures (rate limits, network
//! errors, timeouts, 5xx) with exponential backoff plus jitter. Anything
//! else is returned immediately. The pipeline itself never retries; this
//! is the only retry loop in the request path.

use async_trait::async_trait;
use advisor_core::error::ProviderError;
use advisor_core::provider::*;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const MAX_BACKOFF: Duration = Duration::from_secs(10);

pub struct RetryProvider {
    inner: Arc<dyn Provider>,
    max_retries: u32,
    base_delay: Duration,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn Provider>, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            base_delay: Duration::from_millis(500),
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    fn backoff(&self, attempt: u32, error: &ProviderError) -> Duration {
        let exp = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        let jitter_ms = rand::rng().random_range(0..=self.base_delay.as_millis() as u64 / 2);
        let mut delay = exp + Duration::from_millis(jitter_ms);
        if let ProviderError::RateLimited { retry_after_secs } = error {
            delay = delay.max(Duration::from_secs(*retry_after_secs));
        }
        delay.min(MAX_BACKOFF)
    }
}

#[async_trait]
impl Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => {
                    if attempt > 0 {
                        debug!(provider = %self.inner.name(), attempt, "Retry succeeded");
                    }
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff(attempt, &e);
                    warn!(
                        provider = %self.inner.name(),
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient provider failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
