//! `advisor ask`: one question through the full pipeline.

use advisor_config::ConfigCache;
use advisor_core::message::SessionId;
use advisor_core::turn::{TurnOutcome, TurnRecord};
use advisor_gateway::{ApiError, Runtime};
use advisor_pipeline::{PipelineOutcome, PipelineRequest, PipelineResult};
use std::path::Path;

pub async fn run(
    config_path: &Path,
    question: &str,
    user_id: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigCache::new(config_path).get(false)?;
    let runtime = Runtime::from_config(config)?;
    let pipeline = runtime.pipeline();
    let session_id = SessionId::new();

    let mut turn = TurnRecord {
        timestamp: chrono::Utc::now(),
        session_id: session_id.to_string(),
        user_id: user_id.to_string(),
        email: None,
        email_verified: false,
        user_message: question.to_string(),
        assistant_response: String::new(),
        citations: Vec::new(),
        mode: pipeline.adapter_mode(),
        endpoint_source: format!("{}:cli", runtime.config().turn_log.endpoint_source),
        outcome: TurnOutcome::Answered,
        error_kind: None,
        correlation_id: None,
    };

    let result = pipeline
        .answer(PipelineRequest::new(question, user_id, session_id))
        .await;
    let printed = match result {
        Ok(PipelineOutcome::Refused { message, .. }) => {
            turn.outcome = TurnOutcome::Refused;
            turn.assistant_response = message.clone();
            Ok(message)
        }
        Ok(PipelineOutcome::Answered(result)) => {
            turn.assistant_response = result.final_answer.clone();
            turn.citations = result.citations.clone();
            if json {
                Ok(serde_json::to_string_pretty(&result)?)
            } else {
                Ok(render(&result))
            }
        }
        Err(err) => {
            let api = ApiError::from_pipeline(&err, pipeline.language());
            turn.outcome = TurnOutcome::Failed;
            turn.assistant_response = api.message().to_string();
            turn.error_kind = Some(err.kind());
            turn.correlation_id = api.correlation_id().map(str::to_string);
            Err(format!(
                "{} [{}, correlation id {}]",
                api.message(),
                api.kind(),
                api.correlation_id().unwrap_or("-")
            ))
        }
    };

    runtime.turns().log(&turn).await;
    pipeline.shutdown().await;
    println!("{}", printed?);
    Ok(())
}

fn render(result: &PipelineResult) -> String {
    let mut out = result.final_answer.clone();
    if !result.citations.is_empty() {
        out.push_str("\n\n");
        for (i, c) in result.citations.iter().enumerate() {
            let label = c.title.as_deref().or(c.url.as_deref()).unwrap_or("-");
            out.push_str(&format!("[{}] {label}", i + 1));
            if let (Some(url), Some(_)) = (&c.url, &c.title) {
                out.push_str(&format!(" <{url}>"));
            }
            out.push('\n');
        }
    }
    out
}
