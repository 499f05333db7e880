//! Citation value type and the normalization of loosely-shaped payloads.
//!
//! Evaluators and remote backends describe references with varying field
//! names (English and Spanish). Everything is folded into one canonical
//! [`Citation`] before it reaches the aggregator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// A supporting reference. Identity for deduplication is `(url, title)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

const TITLE_KEYS: &[&str] = &["title", "titulo", "name"];
const SOURCE_KEYS: &[&str] = &["source", "fuente"];
const URL_KEYS: &[&str] = &["url", "link"];
const QUOTE_KEYS: &[&str] = &["quote", "cita", "extracto"];
const DATE_KEYS: &[&str] = &["date", "fecha"];
const SECTION_KEYS: &[&str] = &["section", "seccion"];

/// First non-blank value among the aliases, trimmed.
fn pick(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        let text = match map.get(*k)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    })
}

impl Citation {
    /// A minimal citation holding only a URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Normalize one JSON object, accepting the known field aliases.
    pub fn from_object(map: &Map<String, Value>) -> Self {
        Self {
            title: pick(map, TITLE_KEYS),
            source: pick(map, SOURCE_KEYS),
            url: pick(map, URL_KEYS),
            quote: pick(map, QUOTE_KEYS),
            date: pick(map, DATE_KEYS),
            section: pick(map, SECTION_KEYS),
        }
    }

    /// Deduplication identity. Missing fields count as empty strings.
    pub fn key(&self) -> (&str, &str) {
        (
            self.url.as_deref().unwrap_or(""),
            self.title.as_deref().unwrap_or(""),
        )
    }

    /// Whether the citation can be rendered as a numbered reference.
    pub fn is_renderable(&self) -> bool {
        self.url.is_some() || self.title.is_some()
    }

    /// Parse a citation list from an untrusted payload.
    ///
    /// A value that is not a list is dropped entirely with a warning; inside
    /// a list, entries that are not objects are skipped. Never fails.
    pub fn parse_list(value: &Value, origin: &str) -> Vec<Citation> {
        match value {
            Value::Null => Vec::new(),
            Value::Array(items) => {
                let parsed: Vec<Citation> = items
                    .iter()
                    .filter_map(|item| item.as_object().map(Citation::from_object))
                    .collect();
                if parsed.len() != items.len() {
                    debug!(
                        origin,
                        skipped = items.len() - parsed.len(),
                        "Skipped non-object citation entries"
                    );
                }
                parsed
            }
            other => {
                warn!(origin, found = json_type(other), "Unexpected citations payload, dropping");
                Vec::new()
            }
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
