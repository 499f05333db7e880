//! HTTP handlers.
//!
//! Identity is established upstream; this layer trusts the `x-user-*`
//! headers and only insists that a user id is present.

use advisor_core::adapter::AdapterMode;
use advisor_core::citation::Citation;
use advisor_core::error::Error;
use advisor_core::message::SessionId;
use advisor_core::turn::{TurnOutcome, TurnRecord};
use advisor_core::verdict::EvaluatorVerdict;
use advisor_pipeline::{PanelMode, PipelineOutcome, PipelineRequest};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use crate::error::ApiError;
use crate::runtime::{Runtime, RuntimeCache};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_VERIFIED_HEADER: &str = "x-user-verified";

pub(crate) const ANSWER_ROUTE: &str = "/advisor/answer";
pub(crate) const LEGACY_ROUTE: &str = "/chat_assistant";

/// Shared state for every route.
pub struct GatewayState {
    pub runtime: Arc<RuntimeCache>,
}

pub type SharedState = Arc<GatewayState>;

/// The already-authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
    pub email: Option<String>,
    pub email_verified: bool,
}

impl CallerIdentity {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let user_id = header(USER_ID_HEADER).ok_or_else(|| ApiError::unauthorized("Missing caller identity"))?;
        let email_verified = header(USER_VERIFIED_HEADER)
            .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"));
        Ok(Self {
            user_id,
            email: header(USER_EMAIL_HEADER),
            email_verified,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    #[serde(alias = "question")]
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub status: &'static str,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub session_id: String,
    pub meta: AnswerMeta,
}

#[derive(Debug, Serialize)]
pub struct AnswerMeta {
    pub evaluations: Vec<EvaluatorVerdict>,
    pub draft: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel_mode: Option<PanelMode>,
    pub adapter_mode: AdapterMode,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_checks: Vec<String>,
}

/// The contract older frontends expect from `/chat_assistant`.
#[derive(Debug, Serialize)]
pub struct LegacyResponse {
    pub message: String,
    pub citations: Vec<Citation>,
    pub meta: LegacyMeta,
}

#[derive(Debug, Serialize)]
pub struct LegacyMeta {
    pub evaluations: Vec<EvaluatorVerdict>,
    pub draft: String,
}

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub(crate) async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub(crate) async fn answer_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let served = serve_turn(&state, &headers, payload, ANSWER_ROUTE).await?;
    let adapter_mode = served.runtime.pipeline().adapter_mode();
    let response = match served.outcome {
        PipelineOutcome::Refused { message, failed_checks } => AnswerResponse {
            status: "refused",
            answer: message,
            citations: Vec::new(),
            session_id: served.session_id.to_string(),
            meta: AnswerMeta {
                evaluations: Vec::new(),
                draft: String::new(),
                panel_mode: None,
                adapter_mode,
                failed_checks,
            },
        },
        PipelineOutcome::Answered(result) => AnswerResponse {
            status: "ok",
            answer: result.final_answer,
            citations: result.citations,
            session_id: served.session_id.to_string(),
            meta: AnswerMeta {
                evaluations: result.evaluations,
                draft: result.draft,
                panel_mode: Some(result.panel_mode),
                adapter_mode: result.adapter_mode,
                failed_checks: Vec::new(),
            },
        },
    };
    Ok(Json(response))
}

pub(crate) async fn chat_assistant_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<LegacyResponse>, ApiError> {
    let served = serve_turn(&state, &headers, payload, LEGACY_ROUTE).await?;
    let response = match served.outcome {
        PipelineOutcome::Refused { message, .. } => LegacyResponse {
            message,
            citations: Vec::new(),
            meta: LegacyMeta {
                evaluations: Vec::new(),
                draft: String::new(),
            },
        },
        PipelineOutcome::Answered(result) => LegacyResponse {
            message: result.final_answer,
            citations: result.citations,
            meta: LegacyMeta {
                evaluations: result.evaluations,
                draft: result.draft,
            },
        },
    };
    Ok(Json(response))
}

#[derive(Serialize)]
pub(crate) struct ReloadResponse {
    status: &'static str,
    adapter_mode: AdapterMode,
    evaluators: usize,
}

pub(crate) async fn reload_handler(State(state): State<SharedState>) -> Result<Json<ReloadResponse>, ApiError> {
    let runtime = state.runtime.get(true).await.map_err(|e| {
        warn!(error = %e, "Reload rejected; keeping the running configuration");
        ApiError::from_pipeline(&e, Default::default())
    })?;
    Ok(Json(ReloadResponse {
        status: "reloaded",
        adapter_mode: runtime.pipeline().adapter_mode(),
        evaluators: runtime.pipeline().panel().len(),
    }))
}

struct Served {
    runtime: Arc<Runtime>,
    session_id: SessionId,
    outcome: PipelineOutcome,
}

/// Run one question through the pipeline and record the turn, whatever
/// the outcome.
async fn serve_turn(
    state: &GatewayState,
    headers: &HeaderMap,
    payload: AnswerRequest,
    route: &str,
) -> Result<Served, ApiError> {
    let caller = CallerIdentity::from_headers(headers)?;
    let query = payload.query.trim().to_string();
    if query.is_empty() {
        return Err(ApiError::bad_request("The question must not be empty"));
    }

    let runtime = state
        .runtime
        .get(false)
        .await
        .map_err(|e| ApiError::from_pipeline(&e, Default::default()))?;
    let pipeline = runtime.pipeline();
    let session_id = SessionId::or_new(payload.session_id.as_deref());
    info!(
        route,
        session_id = %session_id,
        user_id = %caller.user_id,
        mode = %pipeline.adapter_mode(),
        "Advisor question received"
    );

    let request = PipelineRequest::new(query.clone(), caller.user_id.clone(), session_id.clone())
        .with_context(payload.context);
    let result = pipeline.answer(request).await;

    let mut turn = TurnRecord {
        timestamp: chrono::Utc::now(),
        session_id: session_id.to_string(),
        user_id: caller.user_id,
        email: caller.email,
        email_verified: caller.email_verified,
        user_message: query,
        assistant_response: String::new(),
        citations: Vec::new(),
        mode: pipeline.adapter_mode(),
        endpoint_source: format!("{}:{route}", runtime.config().turn_log.endpoint_source),
        outcome: TurnOutcome::Answered,
        error_kind: None,
        correlation_id: None,
    };

    match result {
        Ok(outcome) => {
            match &outcome {
                PipelineOutcome::Refused { message, .. } => {
                    turn.outcome = TurnOutcome::Refused;
                    turn.assistant_response = message.clone();
                }
                PipelineOutcome::Answered(answer) => {
                    turn.assistant_response = answer.final_answer.clone();
                    turn.citations = answer.citations.clone();
                }
            }
            runtime.turns().log(&turn).await;
            Ok(Served {
                runtime,
                session_id,
                outcome,
            })
        }
        Err(err) => Err(record_failure(&runtime, turn, &err).await),
    }
}

async fn record_failure(runtime: &Runtime, mut turn: TurnRecord, err: &Error) -> ApiError {
    let api = ApiError::from_pipeline(err, runtime.pipeline().language());
    turn.outcome = TurnOutcome::Failed;
    turn.assistant_response = api.message().to_string();
    turn.error_kind = Some(err.kind());
    turn.correlation_id = api.correlation_id().map(str::to_string);
    runtime.turns().log(&turn).await;
    api
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, v.parse().unwrap());
        }
        map
    }

    #[test]
    fn identity_requires_user_id() {
        let err = CallerIdentity::from_headers(&headers(&[(USER_EMAIL_HEADER, "a@b.org")])).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);

        let err = CallerIdentity::from_headers(&headers(&[(USER_ID_HEADER, "  ")])).unwrap_err();
        assert_eq!(err.kind(), "unauthorized");
    }

    #[test]
    fn identity_reads_optional_headers() {
        let caller = CallerIdentity::from_headers(&headers(&[
            (USER_ID_HEADER, "u-42"),
            (USER_EMAIL_HEADER, "ana@example.org"),
            (USER_VERIFIED_HEADER, "True"),
        ]))
        .unwrap();
        assert_eq!(
            caller,
            CallerIdentity {
                user_id: "u-42".into(),
                email: Some("ana@example.org".into()),
                email_verified: true,
            }
        );

        let caller = CallerIdentity::from_headers(&headers(&[(USER_ID_HEADER, "u-42")])).unwrap();
        assert!(!caller.email_verified);
        assert_eq!(caller.email, None);
    }

    #[test]
    fn question_is_an_alias_for_query() {
        let req: AnswerRequest = serde_json::from_str(r#"{"question": "¿Plazos?"}"#).unwrap();
        assert_eq!(req.query, "¿Plazos?");
        assert!(req.session_id.is_none());
        assert!(req.context.is_empty());
    }
}
