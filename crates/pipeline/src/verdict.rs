//! Normalizing evaluator output into one [`EvaluatorVerdict`].
//!
//! Evaluators are asked for a JSON object but sometimes answer in prose.
//! Both shapes go through [`ParsedVerdict`] and a single normalization
//! step. Anything ambiguous is a rejection.

use advisor_core::agent::AgentOutput;
use advisor_core::citation::Citation;
use advisor_core::verdict::{EvaluatorVerdict, Verdict};
use advisor_providers::extract_json_object;
use regex_lite::Regex;
use serde_json::{Map, Value};
use tracing::debug;

const VERDICT_KEYS: &[&str] = &["veredicto", "verdict"];
const NOTES_KEYS: &[&str] = &["mejoras", "improvement_notes", "improvements", "notes"];
const CITATION_KEYS: &[&str] = &["citas", "citations", "references", "referencias"];

const URL_PATTERN: &str = r#"(?i)https?://[^\s\]\)>,;"]+"#;

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedVerdict {
    Structured {
        verdict: Verdict,
        notes: String,
        citations: Vec<Citation>,
    },
    Unstructured(String),
}

impl ParsedVerdict {
    /// Structured when the output carries a JSON object with a verdict
    /// field; otherwise the raw text.
    pub fn from_output(output: &AgentOutput) -> Self {
        let object = output
            .structured
            .clone()
            .or_else(|| extract_json_object(&output.text));

        match object {
            Some(Value::Object(map)) if first_present(&map, VERDICT_KEYS).is_some() => {
                Self::structured(&map)
            }
            _ => Self::Unstructured(output.text.clone()),
        }
    }

    fn structured(map: &Map<String, Value>) -> Self {
        let verdict = first_present(map, VERDICT_KEYS)
            .and_then(Value::as_str)
            .and_then(Verdict::parse)
            .unwrap_or(Verdict::Rejected);
        let notes = first_present(map, NOTES_KEYS)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let citations = first_present(map, CITATION_KEYS)
            .map(|raw| Citation::parse_list(raw, "evaluator"))
            .unwrap_or_default();
        Self::Structured {
            verdict,
            notes,
            citations,
        }
    }

    pub fn into_verdict(self, agent_label: &str) -> EvaluatorVerdict {
        match self {
            Self::Structured {
                verdict,
                notes,
                citations,
            } => EvaluatorVerdict {
                agent_label: agent_label.to_string(),
                verdict,
                improvement_notes: notes,
                citations,
            },
            Self::Unstructured(text) => {
                let verdict = classify_text(&text);
                debug!(evaluator = agent_label, verdict = %verdict, "Evaluator answered in free text");
                EvaluatorVerdict {
                    agent_label: agent_label.to_string(),
                    verdict,
                    citations: urls_in(&text).into_iter().map(Citation::from_url).collect(),
                    improvement_notes: text,
                }
            }
        }
    }
}

/// Parse one evaluator's output.
pub fn parse_evaluator_output(agent_label: &str, output: &AgentOutput) -> EvaluatorVerdict {
    ParsedVerdict::from_output(output).into_verdict(agent_label)
}

fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find(|v| !v.is_null())
}

const REJECTION_PATTERN: &str = r"(?i)rechaz|reject|\b(no|not|sin|without)\s+(aprob|approv)|(des|dis|un)(aprob|approv)";
const APPROVAL_PATTERN: &str = r"(?i)\b(aprob|approv)";

/// Rejection wins over approval, negated approval counts as rejection,
/// and neither means rejected.
fn classify_text(text: &str) -> Verdict {
    let (Ok(rejection), Ok(approval)) = (Regex::new(REJECTION_PATTERN), Regex::new(APPROVAL_PATTERN))
    else {
        return Verdict::Rejected;
    };
    if rejection.is_match(text) {
        Verdict::Rejected
    } else if approval.is_match(text) {
        Verdict::Approved
    } else {
        Verdict::Rejected
    }
}

fn urls_in(text: &str) -> Vec<String> {
    match Regex::new(URL_PATTERN) {
        Ok(re) => re
            .find_iter(text)
            .map(|m| m.as_str().trim_end_matches(['.', ':', '\'']).to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(text: &str) -> AgentOutput {
        AgentOutput::text(text)
    }

    #[test]
    fn spanish_structured_output() {
        let v = parse_evaluator_output(
            "A4 - Referencias",
            &output(r#"{"veredicto": "rechazado", "mejoras": " cita la fuente X ", "citas": [{"url": "https://example.org/x"}]}"#),
        );
        assert_eq!(v.verdict, Verdict::Rejected);
        assert_eq!(v.improvement_notes, "cita la fuente X");
        assert_eq!(v.citations, vec![Citation::from_url("https://example.org/x")]);
    }

    #[test]
    fn english_structured_output_in_fence() {
        let v = parse_evaluator_output(
            "A1",
            &output("```json\n{\"verdict\": \"APPROVED\", \"improvement_notes\": \"\"}\n```"),
        );
        assert_eq!(v.verdict, Verdict::Approved);
        assert!(v.citations.is_empty());
    }

    #[test]
    fn precomputed_structured_value_wins() {
        let out = AgentOutput {
            text: "ignored".into(),
            structured: Some(serde_json::json!({"verdict": "APPROVED"})),
            tool_calls_made: 0,
        };
        assert_eq!(parse_evaluator_output("A2", &out).verdict, Verdict::Approved);
    }

    #[test]
    fn unknown_structured_verdict_is_rejected() {
        let v = parse_evaluator_output("A2", &output(r#"{"veredicto": "tal vez"}"#));
        assert_eq!(v.verdict, Verdict::Rejected);
    }

    #[test]
    fn references_alias_is_read() {
        let v = parse_evaluator_output(
            "A4",
            &output(r#"{"verdict": "REJECTED", "references": [{"titulo": "CSDDD", "link": "https://eur-lex.europa.eu/a"}]}"#),
        );
        assert_eq!(v.citations[0].title.as_deref(), Some("CSDDD"));
        assert_eq!(v.citations[0].url.as_deref(), Some("https://eur-lex.europa.eu/a"));
    }

    #[test]
    fn free_text_rejection_beats_approval() {
        let v = parse_evaluator_output("A3", &output("Aprobado en parte, pero RECHAZADO por el enfoque."));
        assert_eq!(v.verdict, Verdict::Rejected);
        assert!(v.improvement_notes.starts_with("Aprobado en parte"));
    }

    #[test]
    fn free_text_approval() {
        let v = parse_evaluator_output("A3", &output("Veredicto: APROBADO"));
        assert_eq!(v.verdict, Verdict::Approved);
    }

    #[test]
    fn negated_free_text_approval_is_rejected() {
        for text in [
            "NO APROBADO: faltan fuentes",
            "Not approved, missing sources",
            "I disapprove of this draft",
            "Desaprobado",
            "Unapproved draft",
            "Sin aprobar todavía",
        ] {
            assert_eq!(parse_evaluator_output("A1", &output(text)).verdict, Verdict::Rejected, "{text}");
        }
    }

    #[test]
    fn approval_with_lowercase_prose() {
        assert_eq!(parse_evaluator_output("A1", &output("Approved, no changes needed")).verdict, Verdict::Approved);
    }

    #[test]
    fn ambiguous_free_text_is_rejected() {
        assert_eq!(parse_evaluator_output("A5", &output("")).verdict, Verdict::Rejected);
        assert_eq!(parse_evaluator_output("A5", &output("Looks fine to me")).verdict, Verdict::Rejected);
    }

    #[test]
    fn free_text_urls_become_citations() {
        let v = parse_evaluator_output(
            "A4",
            &output("RECHAZADO: falta citar (https://eur-lex.europa.eu/eli/dir/2024/1760), ver también https://example.org/x."),
        );
        let urls: Vec<_> = v.citations.iter().filter_map(|c| c.url.as_deref()).collect();
        assert_eq!(urls, vec!["https://eur-lex.europa.eu/eli/dir/2024/1760", "https://example.org/x"]);
    }
}
