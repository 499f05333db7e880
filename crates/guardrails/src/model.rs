//! Typed check specifications built from `[[guardrails.checks]]` entries.

use advisor_config::CheckConfig;
use advisor_core::error::GuardrailError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Keywords,
    Pattern,
    Classifier,
    Redact,
}

impl CheckKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "keywords" | "keyword" => Some(Self::Keywords),
            "pattern" | "regex" => Some(Self::Pattern),
            "classifier" | "moderation" => Some(Self::Classifier),
            "redact" | "pii" => Some(Self::Redact),
            _ => None,
        }
    }
}

/// A validated check. Disabled entries never become a spec.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckSpec {
    pub name: String,
    pub kind: CheckKind,
    pub terms: Vec<String>,
    pub patterns: Vec<String>,
    pub model: Option<String>,
    pub instructions: Option<String>,
    pub threshold: f32,
}

impl CheckSpec {
    /// Returns `Ok(None)` for disabled checks.
    pub fn from_config(config: &CheckConfig) -> Result<Option<Self>, GuardrailError> {
        if !config.enabled {
            return Ok(None);
        }
        let invalid = |reason: &str| GuardrailError::InvalidCheck {
            name: config.name.clone(),
            reason: reason.to_string(),
        };

        if config.name.trim().is_empty() {
            return Err(invalid("check name cannot be empty"));
        }
        let kind = CheckKind::parse(&config.kind)
            .ok_or_else(|| invalid(&format!("unknown kind '{}'", config.kind)))?;

        let terms: Vec<String> = config
            .terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        match kind {
            CheckKind::Keywords if terms.is_empty() => return Err(invalid("keywords check needs at least one term")),
            CheckKind::Pattern if config.patterns.is_empty() => {
                return Err(invalid("pattern check needs at least one pattern"));
            }
            _ => {}
        }
        if !(0.0..=1.0).contains(&config.threshold) {
            return Err(invalid("threshold must be between 0.0 and 1.0"));
        }

        Ok(Some(Self {
            name: config.name.clone(),
            kind,
            terms,
            patterns: config.patterns.clone(),
            model: config.model.clone(),
            instructions: config.instructions.clone(),
            threshold: config.threshold,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: &str) -> CheckConfig {
        CheckConfig {
            name: "c".into(),
            kind: kind.into(),
            terms: vec![],
            patterns: vec![],
            model: None,
            instructions: None,
            threshold: 0.7,
            enabled: true,
        }
    }

    #[test]
    fn terms_are_normalized() {
        let mut c = config("keywords");
        c.terms = vec!["  Explosivos ".into(), "".into()];
        let spec = CheckSpec::from_config(&c).unwrap().unwrap();
        assert_eq!(spec.kind, CheckKind::Keywords);
        assert_eq!(spec.terms, vec!["explosivos"]);
    }

    #[test]
    fn disabled_check_is_skipped() {
        let mut c = config("nonsense");
        c.enabled = false;
        assert!(CheckSpec::from_config(&c).unwrap().is_none());
    }

    #[test]
    fn unknown_kind_is_invalid() {
        let err = CheckSpec::from_config(&config("telepathy")).unwrap_err();
        assert!(matches!(err, GuardrailError::InvalidCheck { ref name, .. } if name == "c"));
    }

    #[test]
    fn empty_keyword_list_is_invalid() {
        assert!(CheckSpec::from_config(&config("keywords")).is_err());
        assert!(CheckSpec::from_config(&config("pattern")).is_err());
        assert!(CheckSpec::from_config(&config("redact")).unwrap().is_some());
    }
}
