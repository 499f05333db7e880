//! Every user-visible and model-facing text the pipeline produces, in
//! Spanish (default) and English.

use advisor_config::{AgentRole, Language};
use advisor_core::{ErrorKind, Verdict};

pub fn refusal_message(language: Language) -> &'static str {
    match language {
        Language::Es => {
            "Soy un asistente para responder preguntas relacionadas con Diligencia Debida en Sostenibilidad. \
             Por favor, pruebe con una pregunta sobre ese tema. Contacto: info@observatoriorecava.es"
        }
        Language::En => {
            "I am an assistant for questions about Sustainability Due Diligence. \
             Please try a question on that topic. Contact: info@observatoriorecava.es"
        }
    }
}

/// Short, retry-oriented message shown to the caller for a failed request.
pub fn user_facing_error(kind: ErrorKind, language: Language) -> &'static str {
    match (kind, language) {
        (ErrorKind::UpstreamTimeout, Language::Es) => {
            "El servicio de respuestas no respondió a tiempo. Por favor, inténtelo de nuevo en unos minutos."
        }
        (ErrorKind::UpstreamTimeout, Language::En) => {
            "The answer service did not respond in time. Please try again in a few minutes."
        }
        (ErrorKind::UpstreamFailure, Language::Es) => {
            "El servicio de respuestas no está disponible en este momento. Por favor, inténtelo de nuevo más tarde."
        }
        (ErrorKind::UpstreamFailure, Language::En) => {
            "The answer service is unavailable right now. Please try again later."
        }
        (ErrorKind::Internal, Language::Es) => {
            "Se produjo un error interno. Si el problema persiste, contacte con soporte indicando el identificador de la incidencia."
        }
        (ErrorKind::Internal, Language::En) => {
            "An internal error occurred. If the problem persists, contact support with the incident identifier."
        }
    }
}

/// Display label of an evaluator, used in transcripts and results.
pub fn evaluator_label(role: AgentRole, language: Language) -> &'static str {
    match (role, language) {
        (AgentRole::Structure, Language::Es) => "A1 - Estructura",
        (AgentRole::Precision, Language::Es) => "A2 - Precisión",
        (AgentRole::Focus, Language::Es) => "A3 - Enfoque",
        (AgentRole::References, Language::Es) => "A4 - Referencias",
        (AgentRole::Temporal, Language::Es) => "A5 - Temporal",
        (AgentRole::Structure, Language::En) => "A1 - Structure",
        (AgentRole::Precision, Language::En) => "A2 - Precision",
        (AgentRole::Focus, Language::En) => "A3 - Focus",
        (AgentRole::References, Language::En) => "A4 - References",
        (AgentRole::Temporal, Language::En) => "A5 - Temporal validity",
        (other, _) => other.key(),
    }
}

const EVALUATOR_FORMAT_ES: &str = "Responde solo con un objeto JSON: \
{\"veredicto\": \"APROBADO\" | \"RECHAZADO\", \"mejoras\": \"qué cambiar, vacío si nada\", \
\"citas\": [{\"title\", \"source\", \"url\", \"quote\", \"date\", \"section\"}]}.";

const EVALUATOR_FORMAT_EN: &str = "Answer only with a JSON object: \
{\"verdict\": \"APPROVED\" | \"REJECTED\", \"improvement_notes\": \"what to change, empty if nothing\", \
\"citations\": [{\"title\", \"source\", \"url\", \"quote\", \"date\", \"section\"}]}.";

/// Instructions used when a role has none configured.
pub fn default_instructions(role: AgentRole, language: Language) -> String {
    let focus = match (role, language) {
        (AgentRole::Initial, Language::Es) => {
            return "Eres un asesor experto en diligencia debida en sostenibilidad (CSDDD, CSRD, Ley de Cadena de Suministro). \
                    Responde de forma precisa, estructurada y citando la normativa aplicable."
                .into();
        }
        (AgentRole::Initial, Language::En) => {
            return "You are an expert advisor on sustainability due diligence (CSDDD, CSRD, supply chain acts). \
                    Answer precisely, with structure, citing the applicable regulation."
                .into();
        }
        (AgentRole::Final, Language::Es) => {
            return "Eres el redactor final. Sigue exactamente las reglas de síntesis que recibes.".into();
        }
        (AgentRole::Final, Language::En) => {
            return "You are the final editor. Follow the synthesis rules you receive exactly.".into();
        }
        (AgentRole::Expert, Language::Es) => {
            return "Eres un experto en normativa de sostenibilidad. Responde a la subpregunta de forma breve y exacta.".into();
        }
        (AgentRole::Expert, Language::En) => {
            return "You are a sustainability regulation expert. Answer the sub-question briefly and exactly.".into();
        }
        (AgentRole::Structure, Language::Es) => "la estructura y claridad del borrador",
        (AgentRole::Precision, Language::Es) => "la precisión jurídica y técnica del borrador",
        (AgentRole::Focus, Language::Es) => "si el borrador responde exactamente a la pregunta",
        (AgentRole::References, Language::Es) => "las referencias normativas y fuentes del borrador",
        (AgentRole::Temporal, Language::Es) => "la vigencia temporal de las normas y plazos citados",
        (AgentRole::Structure, Language::En) => "the structure and clarity of the draft",
        (AgentRole::Precision, Language::En) => "the legal and technical precision of the draft",
        (AgentRole::Focus, Language::En) => "whether the draft answers exactly what was asked",
        (AgentRole::References, Language::En) => "the regulatory references and sources of the draft",
        (AgentRole::Temporal, Language::En) => "whether the cited rules and deadlines are still current",
    };
    match language {
        Language::Es => format!(
            "Eres un evaluador. Revisa únicamente {focus}. Aprueba si no hay nada que mejorar. {EVALUATOR_FORMAT_ES}"
        ),
        Language::En => format!(
            "You are an evaluator. Review only {focus}. Approve if nothing needs improving. {EVALUATOR_FORMAT_EN}"
        ),
    }
}

pub fn no_citations(language: Language) -> &'static str {
    match language {
        Language::Es => "Ninguna",
        Language::En => "None",
    }
}

/// Fallback title for a citation that only has a URL.
pub(crate) fn untitled_source(language: Language) -> &'static str {
    match language {
        Language::Es => "Fuente",
        Language::En => "Source",
    }
}

pub(crate) struct SynthesisSections<'a> {
    pub question: &'a str,
    pub draft: &'a str,
    pub transcript: &'a str,
    pub citations: &'a str,
}

pub(crate) fn synthesis_prompt(language: Language, s: &SynthesisSections<'_>) -> String {
    match language {
        Language::Es => format!(
            "### Tarea\n\
             Genera la mejor respuesta final a la pregunta del usuario aplicando, de forma mínima y precisa, \
             las mejoras propuestas por los evaluadores cuyo veredicto fue RECHAZADO. \
             Mantén lo que ya está bien según los evaluadores con veredicto APROBADO.\n\n\
             ### Pregunta original\n{question}\n\n\
             ### Borrador inicial\n{draft}\n\n\
             ### Evaluaciones\n{transcript}\n\n\
             ### Citas disponibles\n\
             Estas son las únicas citas que puedes usar. Si no son necesarias, no las cites. No inventes nuevas fuentes.\n\
             {citations}\n\n\
             ### Reglas de síntesis\n\
             1) Aplica SOLO las mejoras de los evaluadores con veredicto RECHAZADO.\n\
             2) No elimines aciertos ya validados por veredictos APROBADO.\n\
             3) Conserva el estilo y formato del borrador inicial.\n\
             4) Si introduces referencias, usa marcadores en línea [n] que correspondan estrictamente al listado de \"Citas disponibles\".\n\
             5) Si no hay RECHAZADOS, devuelve el borrador inicial tal cual.\n\n\
             ### Respuesta final requerida\n\
             Devuelve ÚNICAMENTE el texto final para el usuario (con marcadores [n] si has usado citas).",
            question = s.question,
            draft = s.draft,
            transcript = s.transcript,
            citations = s.citations,
        ),
        Language::En => format!(
            "### Task\n\
             Produce the best final answer to the user's question by applying, minimally and precisely, \
             the improvements proposed by evaluators whose verdict was REJECTED. \
             Keep what evaluators with an APPROVED verdict found correct.\n\n\
             ### Original question\n{question}\n\n\
             ### Initial draft\n{draft}\n\n\
             ### Evaluations\n{transcript}\n\n\
             ### Available citations\n\
             These are the only citations you may use. Do not cite them if unnecessary. Never introduce new sources.\n\
             {citations}\n\n\
             ### Synthesis rules\n\
             1) Apply ONLY the improvements from evaluators with a REJECTED verdict.\n\
             2) Do not remove content validated by APPROVED verdicts.\n\
             3) Keep the style and format of the initial draft.\n\
             4) If you add references, use inline markers [n] that correspond strictly to the \"Available citations\" list.\n\
             5) If nothing was REJECTED, return the initial draft verbatim.\n\n\
             ### Required final answer\n\
             Return ONLY the final text for the user (with [n] markers if you used citations).",
            question = s.question,
            draft = s.draft,
            transcript = s.transcript,
            citations = s.citations,
        ),
    }
}

pub(crate) fn verdict_word(verdict: Verdict, language: Language) -> &'static str {
    match (verdict, language) {
        (Verdict::Approved, Language::Es) => "APROBADO",
        (Verdict::Rejected, Language::Es) => "RECHAZADO",
        (v, Language::En) => v.as_str(),
    }
}

pub(crate) fn transcript_notes_label(language: Language) -> &'static str {
    match language {
        Language::Es => "mejoras",
        Language::En => "improvements",
    }
}

pub(crate) fn transcript_empty(language: Language) -> &'static str {
    match language {
        Language::Es => "Sin evaluaciones disponibles.",
        Language::En => "No evaluations available.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluator_defaults_ask_for_json() {
        for role in AgentRole::EVALUATORS {
            assert!(default_instructions(role, Language::Es).contains("veredicto"));
            assert!(default_instructions(role, Language::En).contains("improvement_notes"));
        }
    }

    #[test]
    fn error_messages_never_leak_kinds() {
        let msg = user_facing_error(ErrorKind::UpstreamTimeout, Language::Es);
        assert!(!msg.contains("upstream_timeout"));
        assert!(msg.contains("inténtelo de nuevo"));
    }

    #[test]
    fn labels_follow_panel_order() {
        let labels: Vec<_> = AgentRole::EVALUATORS
            .iter()
            .map(|r| evaluator_label(*r, Language::Es))
            .collect();
        assert_eq!(labels[0], "A1 - Estructura");
        assert_eq!(labels[4], "A5 - Temporal");
    }
}
