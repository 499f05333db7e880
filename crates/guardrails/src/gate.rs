//! The safety gate: ordered checks over progressively rewritten text.

use advisor_config::GuardrailsConfig;
use advisor_core::error::GuardrailError;
use advisor_core::provider::Provider;
use std::sync::Arc;
use tracing::{debug, warn};
use crate::checks::{CheckOutcome, ClassifierCheck, KeywordCheck, PatternCheck, RedactCheck, SafetyCheck};
use crate::model::{CheckKind, CheckSpec};

#[derive(Debug, Clone)]
pub struct GateReport {
    pub tripwire: bool,
    /// Text to use downstream; equals the input unless a check rewrote it
    pub checked_text: String,
    pub outcomes: Vec<CheckOutcome>,
}

impl GateReport {
    /// Checks that tripped.
    pub fn failures(&self) -> Vec<&CheckOutcome> {
        self.outcomes.iter().filter(|o| o.tripped).collect()
    }
}

#[derive(Default)]
pub struct SafetyGate {
    checks: Vec<Box<dyn SafetyCheck>>,
}

impl SafetyGate {
    /// A gate with no checks passes everything through unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check(mut self, check: Box<dyn SafetyCheck>) -> Self {
        self.checks.push(check);
        self
    }

    /// Build from configuration. Classifier checks without their own model
    /// use `default_model`.
    pub fn from_config(
        config: &GuardrailsConfig,
        provider: Arc<dyn Provider>,
        default_model: &str,
    ) -> Result<Self, GuardrailError> {
        let mut gate = Self::new();
        for entry in &config.checks {
            let Some(spec) = CheckSpec::from_config(entry)? else {
                debug!(check = %entry.name, "Skipping disabled check");
                continue;
            };
            let check: Box<dyn SafetyCheck> = match spec.kind {
                CheckKind::Keywords => Box::new(KeywordCheck::new(&spec)),
                CheckKind::Pattern => Box::new(PatternCheck::new(&spec)?),
                CheckKind::Classifier => Box::new(ClassifierCheck::new(&spec, Arc::clone(&provider), default_model)),
                CheckKind::Redact => Box::new(RedactCheck::new(&spec)?),
            };
            gate = gate.with_check(check);
        }
        Ok(gate)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check in order, stopping at the first tripwire.
    pub async fn check(&self, raw_text: &str) -> Result<GateReport, GuardrailError> {
        let mut text = raw_text.to_string();
        let mut outcomes = Vec::with_capacity(self.checks.len());

        for check in &self.checks {
            let mut outcome = check.evaluate(&text).await?;
            if let Some(rewritten) = outcome.rewritten.take() {
                debug!(check = %check.name(), "Check rewrote the question");
                text = rewritten;
            }
            let tripped = outcome.tripped;
            outcomes.push(outcome);
            if tripped {
                warn!(check = %check.name(), "Safety tripwire");
                return Ok(GateReport {
                    tripwire: true,
                    checked_text: text,
                    outcomes,
                });
            }
        }

        Ok(GateReport {
            tripwire: false,
            checked_text: text,
            outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_config::CheckConfig;
    use advisor_core::error::ProviderError;
    use advisor_core::provider::{ProviderRequest, ProviderResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider(AtomicUsize);

    #[async_trait]
    impl Provider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Network("unreachable".into()))
        }
    }

    fn check(name: &str, kind: &str, terms: &[&str]) -> CheckConfig {
        CheckConfig {
            name: name.into(),
            kind: kind.into(),
            terms: terms.iter().map(|t| t.to_string()).collect(),
            patterns: vec![],
            model: None,
            instructions: None,
            threshold: 0.7,
            enabled: true,
        }
    }

    fn gate(checks: Vec<CheckConfig>) -> (SafetyGate, Arc<CountingProvider>) {
        let provider = Arc::new(CountingProvider(AtomicUsize::new(0)));
        let gate = SafetyGate::from_config(&GuardrailsConfig { checks }, provider.clone(), "m").unwrap();
        (gate, provider)
    }

    #[tokio::test]
    async fn empty_gate_passes_text_through() {
        let report = SafetyGate::new().check("¿Qué es la CSDDD?").await.unwrap();
        assert!(!report.tripwire);
        assert_eq!(report.checked_text, "¿Qué es la CSDDD?");
        assert!(report.failures().is_empty());
    }

    #[tokio::test]
    async fn tripwire_short_circuits_later_checks() {
        let (gate, provider) = gate(vec![
            check("weapons", "keywords", &["armas"]),
            check("moderation", "classifier", &[]),
        ]);
        let report = gate.check("venta de armas").await.unwrap();
        assert!(report.tripwire);
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.failures()[0].check, "weapons");
        assert_eq!(provider.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn later_checks_see_redacted_text() {
        let (gate, _) = gate(vec![
            check("pii", "redact", &[]),
            check("no-email-token", "keywords", &["[email]"]),
        ]);
        let report = gate.check("contacto: a@b.com").await.unwrap();
        assert!(report.tripwire);
        assert_eq!(report.checked_text, "contacto: [EMAIL]");
    }

    #[tokio::test]
    async fn faulty_check_is_an_error_not_a_pass() {
        let (gate, provider) = gate(vec![check("moderation", "classifier", &[])]);
        let err = gate.check("¿Qué es la CSDDD?").await.unwrap_err();
        assert!(matches!(err, GuardrailError::Provider { .. }));
        assert_eq!(provider.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disabled_checks_are_not_built() {
        let mut disabled = check("off", "keywords", &["x"]);
        disabled.enabled = false;
        let (gate, _) = gate(vec![disabled, check("pii", "redact", &[])]);
        assert_eq!(gate.len(), 1);
    }
}
