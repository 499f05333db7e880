//! Synthesis stage: merge rejected evaluators' improvements into the draft.

use advisor_config::Language;
use advisor_core::agent::AgentCapability;
use advisor_core::citation::Citation;
use advisor_core::error::ProviderError;
use advisor_core::message::Message;
use advisor_core::verdict::EvaluatorVerdict;
use regex_lite::{Captures, Regex};
use std::sync::Arc;
use tracing::{debug, info, warn};
use crate::prompts::{self, SynthesisSections};

/// Everything the final agent is told about one request. Built once,
/// consumed once.
#[derive(Debug, Clone)]
pub struct SynthesisInput {
    pub question: String,
    pub draft: String,
    pub evaluations: Vec<EvaluatorVerdict>,
    pub citations: Vec<Citation>,
}

impl SynthesisInput {
    pub fn has_rejections(&self) -> bool {
        self.evaluations.iter().any(EvaluatorVerdict::is_rejected)
    }

    /// Numbered citation block. Numbers are positions in `citations`, so
    /// `[n]` always refers to the n-th returned citation; entries with
    /// neither url nor title are left out of the listing.
    pub fn render_citations(&self, language: Language) -> String {
        let lines: Vec<String> = self
            .citations
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_renderable())
            .map(|(i, c)| render_citation(i + 1, c, language))
            .collect();
        if lines.is_empty() {
            prompts::no_citations(language).to_string()
        } else {
            lines.join("\n")
        }
    }

    /// Every verdict, with improvement notes only for rejections.
    pub fn render_transcript(&self, language: Language) -> String {
        if self.evaluations.is_empty() {
            return prompts::transcript_empty(language).to_string();
        }
        let notes_label = prompts::transcript_notes_label(language);
        self.evaluations
            .iter()
            .map(|v| {
                let mut line = format!("- {}: {}", v.agent_label, prompts::verdict_word(v.verdict, language));
                if v.is_rejected() && !v.improvement_notes.trim().is_empty() {
                    line.push_str(&format!("\n  {notes_label}: {}", v.improvement_notes.trim()));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn prompt(&self, language: Language) -> String {
        let transcript = self.render_transcript(language);
        let citations = self.render_citations(language);
        prompts::synthesis_prompt(
            language,
            &SynthesisSections {
                question: &self.question,
                draft: &self.draft,
                transcript: &transcript,
                citations: &citations,
            },
        )
    }
}

fn render_citation(n: usize, c: &Citation, language: Language) -> String {
    let title = c
        .title
        .as_deref()
        .or(c.url.as_deref())
        .unwrap_or(prompts::untitled_source(language));
    let url_in_title = c.title.is_none();
    let tail: Vec<&str> = [
        c.source.as_deref(),
        c.date.as_deref(),
        if url_in_title { None } else { c.url.as_deref() },
    ]
    .into_iter()
    .flatten()
    .collect();
    if tail.is_empty() {
        format!("[{n}] {title}")
    } else {
        format!("[{n}] {title} — {}", tail.join(" "))
    }
}

/// Bracketed numbers above this are read as prose (years, article numbers).
const MAX_MARKER: usize = 99;

/// Remove `[n]` markers that do not point at a citation shown in the
/// numbered block. Larger bracketed numbers are left alone.
pub fn strip_unknown_markers(text: &str, citations: &[Citation]) -> String {
    let Ok(marker) = Regex::new(r"\s?\[(\d{1,3})\]") else {
        return text.to_string();
    };
    marker
        .replace_all(text, |caps: &Captures<'_>| {
            let Ok(n) = caps[1].parse::<usize>() else {
                return caps[0].to_string();
            };
            let listed = n >= 1 && citations.get(n - 1).is_some_and(Citation::is_renderable);
            if listed || n > MAX_MARKER {
                caps[0].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

pub struct SynthesisStage {
    agent: Arc<dyn AgentCapability>,
    language: Language,
}

impl SynthesisStage {
    pub fn new(agent: Arc<dyn AgentCapability>, language: Language) -> Self {
        Self { agent, language }
    }

    /// Final answer text. With no rejections the draft comes back verbatim
    /// and the final agent is never called.
    pub async fn run(&self, input: &SynthesisInput) -> Result<String, ProviderError> {
        if !input.has_rejections() {
            info!(evaluations = input.evaluations.len(), "No rejections, returning the draft verbatim");
            return Ok(input.draft.clone());
        }

        let prompt = input.prompt(self.language);
        debug!(agent = %self.agent.label(), prompt_chars = prompt.len(), "Running synthesis");
        let output = self.agent.run(&[Message::user(prompt)]).await?;

        let answer = strip_unknown_markers(&output.text, &input.citations);
        if answer.trim().is_empty() {
            warn!(agent = %self.agent.label(), "Synthesis produced no text, falling back to the draft");
            return Ok(input.draft.clone());
        }
        Ok(answer)
    }
}
