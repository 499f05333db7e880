//! Validation of `{response_text, citations, debug}` answer payloads.

use advisor_core::adapter::AdapterOutput;
use advisor_core::citation::Citation;
use advisor_core::error::AdapterError;
use serde_json::Value;
use tracing::warn;

/// Turn an upstream answer payload into an [`AdapterOutput`].
///
/// Only a non-object payload is an error. A missing or null
/// `response_text` reads as empty, malformed citations are dropped with a
/// warning, and a non-object `debug` is ignored.
pub fn parse_answer_payload(payload: Value, origin: &str) -> Result<AdapterOutput, AdapterError> {
    let Value::Object(mut body) = payload else {
        return Err(AdapterError::InvalidPayload(format!(
            "{origin} returned a non-object payload"
        )));
    };

    let response_text = match body.remove("response_text") {
        Some(Value::String(text)) => text,
        None | Some(Value::Null) => String::new(),
        Some(other) => {
            return Err(AdapterError::InvalidPayload(format!(
                "{origin} returned a non-string response_text: {other}"
            )));
        }
    };

    let citations = body
        .get("citations")
        .map(|raw| Citation::parse_list(raw, origin))
        .unwrap_or_default();

    let debug = match body.remove("debug") {
        Some(Value::Object(map)) => Some(map),
        None | Some(Value::Null) => None,
        Some(_) => {
            warn!(origin, "Ignoring non-object debug payload");
            None
        }
    };

    Ok(AdapterOutput {
        response_text,
        citations,
        debug,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_payload() {
        let out = parse_answer_payload(
            json!({
                "response_text": "Respuesta",
                "citations": [{"title": "CSDDD", "url": "https://eur-lex.europa.eu/x"}],
                "debug": {"tool": "lookup"}
            }),
            "test",
        )
        .unwrap();
        assert_eq!(out.response_text, "Respuesta");
        assert_eq!(out.citations.len(), 1);
        assert_eq!(out.citations[0].title.as_deref(), Some("CSDDD"));
        assert_eq!(out.debug.unwrap()["tool"], "lookup");
    }

    #[test]
    fn string_citations_become_empty_list() {
        let out = parse_answer_payload(
            json!({"response_text": "ok", "citations": "see annex"}),
            "test",
        )
        .unwrap();
        assert!(out.citations.is_empty());
    }

    #[test]
    fn non_object_entries_are_skipped() {
        let out = parse_answer_payload(
            json!({"response_text": "ok", "citations": ["x", 3, {"url": "https://a.example"}]}),
            "test",
        )
        .unwrap();
        assert_eq!(out.citations.len(), 1);
    }

    #[test]
    fn missing_text_is_empty() {
        let out = parse_answer_payload(json!({"response_text": null}), "test").unwrap();
        assert_eq!(out.response_text, "");
        assert!(out.debug.is_none());
    }

    #[test]
    fn non_object_payload_is_invalid() {
        let err = parse_answer_payload(json!(["nope"]), "test").unwrap_err();
        assert!(matches!(err, AdapterError::InvalidPayload(_)));
    }

    #[test]
    fn numeric_text_is_invalid() {
        let err = parse_answer_payload(json!({"response_text": 42}), "test").unwrap_err();
        assert!(matches!(err, AdapterError::InvalidPayload(_)));
    }
}
