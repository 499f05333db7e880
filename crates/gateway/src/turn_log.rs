//! Turn logging: one record per request, fanned out to every sink.
//!
//! Sinks are write-only. A sink failure is logged and otherwise ignored so
//! the caller still gets its response.

use advisor_config::AppConfig;
use advisor_core::error::TurnLogError;
use advisor_core::turn::{TurnRecord, TurnSink};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Emits each turn as a structured `tracing` event.
pub struct TracingTurnSink;

#[async_trait]
impl TurnSink for TracingTurnSink {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn record(&self, turn: &TurnRecord) -> Result<(), TurnLogError> {
        info!(
            target: "advisor::turns",
            session_id = %turn.session_id,
            user_id = %turn.user_id,
            outcome = ?turn.outcome,
            mode = %turn.mode,
            endpoint_source = %turn.endpoint_source,
            citations = turn.citations.len(),
            error_kind = turn.error_kind.map(|k| k.as_str()),
            correlation_id = turn.correlation_id.as_deref(),
            "Turn recorded"
        );
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
pub struct JsonlTurnSink {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlTurnSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TurnSink for JsonlTurnSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn record(&self, turn: &TurnRecord) -> Result<(), TurnLogError> {
        let mut line = serde_json::to_string(turn).map_err(|e| TurnLogError::Encode(e.to_string()))?;
        line.push('\n');

        let write_failed = |e: std::io::Error| TurnLogError::Write {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        };
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(write_failed)?;
        file.write_all(line.as_bytes()).await.map_err(write_failed)?;
        file.flush().await.map_err(write_failed)
    }
}

/// Keeps turns in memory; used by tests and the `ask` command.
#[derive(Default)]
pub struct MemoryTurnSink {
    turns: Mutex<Vec<TurnRecord>>,
}

impl MemoryTurnSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> Vec<TurnRecord> {
        self.turns.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl TurnSink for MemoryTurnSink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn record(&self, turn: &TurnRecord) -> Result<(), TurnLogError> {
        self.turns.lock().unwrap_or_else(|p| p.into_inner()).push(turn.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct TurnLogger {
    sinks: Vec<Arc<dyn TurnSink>>,
}

impl TurnLogger {
    /// A logger with no sinks; every record is dropped.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn TurnSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Tracing sink plus a JSONL file when `turn_log.jsonl_path` is set.
    /// Relative paths are taken from the config file's directory.
    pub fn from_config(config: &AppConfig) -> Self {
        let settings = &config.turn_log;
        if !settings.enabled {
            return Self::new();
        }
        let mut logger = Self::new().with_sink(Arc::new(TracingTurnSink));
        if let Some(path) = &settings.jsonl_path {
            let path = Path::new(path);
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                config.base_dir.clone().unwrap_or_else(|| PathBuf::from(".")).join(path)
            };
            logger = logger.with_sink(Arc::new(JsonlTurnSink::new(path)));
        }
        logger
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub async fn log(&self, turn: &TurnRecord) {
        for sink in &self.sinks {
            if let Err(e) = sink.record(turn).await {
                warn!(sink = sink.name(), session_id = %turn.session_id, error = %e, "Turn sink failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::adapter::AdapterMode;
    use advisor_core::turn::TurnOutcome;

    fn turn(session: &str) -> TurnRecord {
        TurnRecord {
            timestamp: chrono::Utc::now(),
            session_id: session.into(),
            user_id: "u1".into(),
            email: Some("ana@example.org".into()),
            email_verified: true,
            user_message: "¿Qué exige la CSDDD?".into(),
            assistant_response: "Respuesta".into(),
            citations: vec![],
            mode: AdapterMode::Direct,
            endpoint_source: "advisor_answer".into(),
            outcome: TurnOutcome::Answered,
            error_kind: None,
            correlation_id: None,
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl TurnSink for BrokenSink {
        fn name(&self) -> &str {
            "broken"
        }

        async fn record(&self, _turn: &TurnRecord) -> Result<(), TurnLogError> {
            Err(TurnLogError::Write {
                path: "turns.jsonl".into(),
                reason: "disk full".into(),
            })
        }
    }

    #[tokio::test]
    async fn jsonl_sink_appends_one_line_per_turn() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlTurnSink::new(dir.path().join("turns.jsonl"));
        sink.record(&turn("s1")).await.unwrap();
        sink.record(&turn("s2")).await.unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<serde_json::Value> = content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["session_id"], "s1");
        assert_eq!(lines[1]["outcome"], "answered");
    }

    #[tokio::test]
    async fn jsonl_sink_reports_unwritable_paths() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlTurnSink::new(dir.path());
        let err = sink.record(&turn("s1")).await.unwrap_err();
        assert!(matches!(err, TurnLogError::Write { .. }));
    }

    #[tokio::test]
    async fn failing_sink_does_not_stop_the_others() {
        let memory = Arc::new(MemoryTurnSink::new());
        let logger = TurnLogger::new().with_sink(Arc::new(BrokenSink)).with_sink(memory.clone());
        logger.log(&turn("s1")).await;
        assert_eq!(memory.turns().len(), 1);
    }

    #[test]
    fn from_config_resolves_relative_jsonl_path() {
        let mut config = AppConfig::default();
        config.base_dir = Some(PathBuf::from("/srv/advisor"));
        config.turn_log.jsonl_path = Some("logs/turns.jsonl".into());
        assert_eq!(TurnLogger::from_config(&config).sink_names(), vec!["tracing", "jsonl"]);

        config.turn_log.enabled = false;
        assert!(TurnLogger::from_config(&config).sink_names().is_empty());
    }
}
