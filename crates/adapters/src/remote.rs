//! Remote variant: forwards the query to an answer server over HTTP.
//!
//! Wire contract: `POST {base_url}/advisor/answer` with
//! `{query, user_id, session_id, context}`, answered by
//! `{response_text, citations, debug?}`. Non-2xx is a hard failure.

use async_trait::async_trait;
use advisor_config::RemoteAdapterConfig;
use advisor_core::adapter::{AdapterMode, AdapterOutput, AdapterRequest, CompletionAdapter};
use advisor_core::error::AdapterError;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use crate::payload::parse_answer_payload;

const ANSWER_PATH: &str = "/advisor/answer";
const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct AnswerRequest<'a> {
    query: &'a str,
    user_id: &'a str,
    session_id: &'a str,
    context: &'a serde_json::Map<String, serde_json::Value>,
}

pub struct RemoteAdapter {
    endpoint: String,
    api_key: Option<String>,
    read_timeout: Duration,
    /// `None` once closed
    client: RwLock<Option<Client>>,
}

impl RemoteAdapter {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()
            .map_err(|e| AdapterError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: answer_endpoint(base_url),
            api_key: api_key.filter(|k| !k.is_empty()),
            read_timeout,
            client: RwLock::new(Some(client)),
        })
    }

    pub fn from_config(config: &RemoteAdapterConfig) -> Result<Self, AdapterError> {
        let base_url = config
            .base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| AdapterError::NotConfigured("remote adapter requires a base_url".into()))?;
        Self::new(
            base_url,
            config.api_key.clone(),
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.read_timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_send_error(&self, e: reqwest::Error) -> AdapterError {
        if e.is_timeout() {
            AdapterError::Timeout {
                after_secs: self.read_timeout.as_secs(),
            }
        } else {
            AdapterError::Transport(e.to_string())
        }
    }
}

fn answer_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with(ANSWER_PATH) {
        base.to_string()
    } else {
        format!("{base}{ANSWER_PATH}")
    }
}

#[async_trait]
impl CompletionAdapter for RemoteAdapter {
    fn mode(&self) -> AdapterMode {
        AdapterMode::Remote
    }

    async fn generate(&self, request: &AdapterRequest) -> Result<AdapterOutput, AdapterError> {
        let client = self.client.read().await.clone().ok_or(AdapterError::Closed)?;

        let body = AnswerRequest {
            query: &request.query,
            user_id: &request.user_id,
            session_id: request.session_id.as_str(),
            context: &request.context,
        };

        debug!(endpoint = %self.endpoint, session_id = %request.session_id, "Forwarding to remote answer server");
        let mut http = client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            http = http.header("x-api-key", key);
        }

        let response = http.send().await.map_err(|e| self.map_send_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            warn!(endpoint = %self.endpoint, status = status.as_u16(), "Remote answer server returned an error status");
            return Err(AdapterError::UpstreamStatus {
                status_code: status.as_u16(),
                body,
            });
        }

        let raw = response.text().await.map_err(|e| self.map_send_error(e))?;
        let payload: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| AdapterError::InvalidPayload(format!("undecodable body: {e}")))?;
        parse_answer_payload(payload, "remote answer server")
    }

    async fn close(&self) {
        if self.client.write().await.take().is_some() {
            info!(endpoint = %self.endpoint, "Remote adapter client released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::message::SessionId;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(base: &str, read_secs: u64) -> RemoteAdapter {
        RemoteAdapter::new(
            base,
            Some("secret".into()),
            Duration::from_secs(2),
            Duration::from_secs(read_secs),
        )
        .unwrap()
    }

    fn request() -> AdapterRequest {
        let mut ctx = serde_json::Map::new();
        ctx.insert("sector".into(), serde_json::json!("textil"));
        AdapterRequest::new("¿Qué exige el artículo 8?", "u1", SessionId("s1".into())).with_context(ctx)
    }

    #[test]
    fn endpoint_is_appended_once() {
        assert_eq!(answer_endpoint("http://mcp:9000/"), "http://mcp:9000/advisor/answer");
        assert_eq!(
            answer_endpoint("http://mcp:9000/advisor/answer"),
            "http://mcp:9000/advisor/answer"
        );
    }

    #[tokio::test]
    async fn posts_contract_body_and_parses_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/advisor/answer"))
            .and(header("x-api-key", "secret"))
            .and(body_partial_json(serde_json::json!({
                "query": "¿Qué exige el artículo 8?",
                "user_id": "u1",
                "session_id": "s1",
                "context": {"sector": "textil"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response_text": "El artículo 8 exige...",
                "citations": [{"title": "CSDDD art. 8", "url": "https://example.org/art8"}],
                "debug": {"tool_calls": 1}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let out = adapter(&server.uri(), 5).generate(&request()).await.unwrap();
        assert_eq!(out.response_text, "El artículo 8 exige...");
        assert_eq!(out.citations.len(), 1);
        assert_eq!(out.citations[0].url.as_deref(), Some("https://example.org/art8"));
        assert!(out.debug.is_some());
    }

    #[tokio::test]
    async fn malformed_citations_are_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/advisor/answer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response_text": "ok",
                "citations": "not a list"
            })))
            .mount(&server)
            .await;

        let out = adapter(&server.uri(), 5).generate(&request()).await.unwrap();
        assert_eq!(out.response_text, "ok");
        assert!(out.citations.is_empty());
    }

    #[tokio::test]
    async fn error_status_carries_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/advisor/answer"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = adapter(&server.uri(), 5).generate(&request()).await.unwrap_err();
        match err {
            AdapterError::UpstreamStatus { status_code, body } => {
                assert_eq!(status_code, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_body_is_invalid_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/advisor/answer"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = adapter(&server.uri(), 5).generate(&request()).await.unwrap_err();
        assert!(matches!(err, AdapterError::InvalidPayload(_)));
        assert_eq!(err.kind(), advisor_core::ErrorKind::UpstreamFailure);
    }

    #[tokio::test]
    async fn slow_server_is_typed_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/advisor/answer"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"response_text": "late"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = adapter(&server.uri(), 1).generate(&request()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Timeout { after_secs: 1 }));
        assert_eq!(err.kind(), advisor_core::ErrorKind::UpstreamTimeout);
    }

    #[tokio::test]
    async fn closed_adapter_refuses_requests() {
        let adapter = adapter("http://127.0.0.1:9", 1);
        adapter.close().await;
        let err = adapter.generate(&request()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Closed));
    }

    #[test]
    fn from_config_requires_base_url() {
        let err = RemoteAdapter::from_config(&RemoteAdapterConfig::default()).err().unwrap();
        assert!(matches!(err, AdapterError::NotConfigured(_)));
    }
}
