//! The individual safety checks.

use async_trait::async_trait;
use advisor_core::error::GuardrailError;
use advisor_core::message::Message;
use advisor_core::provider::{Provider, ProviderRequest};
use advisor_providers::extract_json_object;
use regex_lite::Regex;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use crate::model::CheckSpec;

/// Result of running one check against the current text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutcome {
    pub check: String,
    pub tripped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Replacement text, if the check rewrote its input
    #[serde(skip)]
    pub rewritten: Option<String>,
}

impl CheckOutcome {
    pub fn pass(check: &str) -> Self {
        Self {
            check: check.to_string(),
            tripped: false,
            reason: None,
            rewritten: None,
        }
    }

    pub fn trip(check: &str, reason: impl Into<String>) -> Self {
        Self {
            check: check.to_string(),
            tripped: true,
            reason: Some(reason.into()),
            rewritten: None,
        }
    }
}

#[async_trait]
pub trait SafetyCheck: Send + Sync {
    fn name(&self) -> &str;

    /// Decide on `text`. `Err` means no decision could be made.
    async fn evaluate(&self, text: &str) -> Result<CheckOutcome, GuardrailError>;
}

/// Trips when any term occurs in the text, ignoring case.
pub struct KeywordCheck {
    name: String,
    terms: Vec<String>,
}

impl KeywordCheck {
    pub fn new(spec: &CheckSpec) -> Self {
        Self {
            name: spec.name.clone(),
            terms: spec.terms.iter().map(|t| t.to_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl SafetyCheck for KeywordCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(&self, text: &str) -> Result<CheckOutcome, GuardrailError> {
        let haystack = text.to_lowercase();
        Ok(match self.terms.iter().find(|t| haystack.contains(t.as_str())) {
            Some(term) => CheckOutcome::trip(&self.name, format!("matched term '{term}'")),
            None => CheckOutcome::pass(&self.name),
        })
    }
}

/// Trips when any regular expression matches.
pub struct PatternCheck {
    name: String,
    patterns: Vec<Regex>,
}

impl PatternCheck {
    pub fn new(spec: &CheckSpec) -> Result<Self, GuardrailError> {
        let patterns = spec
            .patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| GuardrailError::InvalidCheck {
                    name: spec.name.clone(),
                    reason: format!("invalid pattern '{p}': {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: spec.name.clone(),
            patterns,
        })
    }
}

#[async_trait]
impl SafetyCheck for PatternCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(&self, text: &str) -> Result<CheckOutcome, GuardrailError> {
        Ok(match self.patterns.iter().find(|re| re.is_match(text)) {
            Some(re) => CheckOutcome::trip(&self.name, format!("matched pattern '{}'", re.as_str())),
            None => CheckOutcome::pass(&self.name),
        })
    }
}

const CLASSIFIER_INSTRUCTIONS: &str = "You screen questions sent to a corporate sustainability due-diligence advisor. \
Flag questions that request harmful, illegal or clearly off-topic assistance. \
Reply with a single JSON object: {\"flagged\": true|false, \"confidence\": number between 0 and 1, \"reason\": string}.";

/// Asks the completion capability to classify the text.
pub struct ClassifierCheck {
    name: String,
    provider: Arc<dyn Provider>,
    model: String,
    instructions: String,
    threshold: f32,
}

impl ClassifierCheck {
    pub fn new(spec: &CheckSpec, provider: Arc<dyn Provider>, default_model: &str) -> Self {
        Self {
            name: spec.name.clone(),
            provider,
            model: spec.model.clone().unwrap_or_else(|| default_model.to_string()),
            instructions: spec
                .instructions
                .clone()
                .unwrap_or_else(|| CLASSIFIER_INSTRUCTIONS.to_string()),
            threshold: spec.threshold,
        }
    }

    fn failed(&self, reason: impl Into<String>) -> GuardrailError {
        GuardrailError::CheckFailed {
            check: self.name.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SafetyCheck for ClassifierCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(&self, text: &str) -> Result<CheckOutcome, GuardrailError> {
        let request = ProviderRequest::new(
            &self.model,
            vec![Message::system(&self.instructions), Message::user(text)],
        )
        .with_temperature(0.0);

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|source| GuardrailError::Provider {
                check: self.name.clone(),
                source,
            })?;

        let reply = response.message.content;
        let verdict = extract_json_object(&reply)
            .ok_or_else(|| self.failed("classifier reply is not a JSON object"))?;
        let flagged = verdict["flagged"]
            .as_bool()
            .ok_or_else(|| self.failed("classifier reply lacks a boolean 'flagged'"))?;
        let confidence = verdict["confidence"].as_f64().unwrap_or(1.0) as f32;

        debug!(check = %self.name, flagged, confidence, "Classifier decision");
        if flagged && confidence >= self.threshold {
            let reason = verdict["reason"].as_str().unwrap_or("flagged by classifier");
            Ok(CheckOutcome::trip(&self.name, reason))
        } else {
            Ok(CheckOutcome::pass(&self.name))
        }
    }
}

const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}";
const PHONE_PATTERN: &str = r"\+?\d[\d\s().-]{7,}\d";
/// Digit groups that look like ISO dates or amounts with thousands separators.
const NOT_PHONE_PATTERN: &str = r"^(\d{4}-\d{2}-\d{2}|\d{1,3}([.,]\d{3})+([.,]\d+)?)$";
const MIN_PHONE_DIGITS: usize = 9;
const MIN_INTERNATIONAL_DIGITS: usize = 8;

/// Replaces e-mail addresses and phone numbers with placeholders. Never trips.
pub struct RedactCheck {
    name: String,
    email: Regex,
    phone: Regex,
    not_phone: Regex,
}

impl RedactCheck {
    pub fn new(spec: &CheckSpec) -> Result<Self, GuardrailError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| GuardrailError::InvalidCheck {
                name: spec.name.clone(),
                reason: e.to_string(),
            })
        };
        Ok(Self {
            name: spec.name.clone(),
            email: compile(EMAIL_PATTERN)?,
            phone: compile(PHONE_PATTERN)?,
            not_phone: compile(NOT_PHONE_PATTERN)?,
        })
    }

    fn looks_like_phone(&self, candidate: &str) -> bool {
        let digits = candidate.chars().filter(char::is_ascii_digit).count();
        if candidate.starts_with('+') {
            return digits >= MIN_INTERNATIONAL_DIGITS;
        }
        digits >= MIN_PHONE_DIGITS
            && !candidate
                .split_whitespace()
                .any(|group| self.not_phone.is_match(group.trim_matches(['(', ')', '.'])))
    }
}

#[async_trait]
impl SafetyCheck for RedactCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(&self, text: &str) -> Result<CheckOutcome, GuardrailError> {
        let redacted = self.email.replace_all(text, "[EMAIL]");
        let redacted = self
            .phone
            .replace_all(&redacted, |caps: &regex_lite::Captures<'_>| {
                let candidate = &caps[0];
                if self.looks_like_phone(candidate) {
                    "[PHONE]".to_string()
                } else {
                    candidate.to_string()
                }
            })
            .into_owned();
        let mut outcome = CheckOutcome::pass(&self.name);
        if redacted != text {
            outcome.rewritten = Some(redacted);
        }
        Ok(outcome)
    }
}
