//! The live pipeline and everything built from one configuration snapshot.

use advisor_config::{AppConfig, ConfigCache};
use advisor_core::error::Error;
use advisor_pipeline::{Pipeline, build_pipeline};
use advisor_providers::build_provider;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use crate::turn_log::TurnLogger;

/// A pipeline plus the turn logger built from the same config.
pub struct Runtime {
    config: Arc<AppConfig>,
    pipeline: Pipeline,
    turns: TurnLogger,
}

impl Runtime {
    pub fn new(config: Arc<AppConfig>, pipeline: Pipeline, turns: TurnLogger) -> Self {
        Self {
            config,
            pipeline,
            turns,
        }
    }

    /// Build the provider, pipeline and turn sinks from `config`.
    pub fn from_config(config: Arc<AppConfig>) -> Result<Self, Error> {
        let provider = build_provider(&config)?;
        let pipeline = build_pipeline(&config, provider)?;
        let turns = TurnLogger::from_config(&config);
        Ok(Self::new(config, pipeline, turns))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn turns(&self) -> &TurnLogger {
        &self.turns
    }
}

/// The last handle to a runtime releases its adapter. Requests that still
/// hold the runtime after a reload keep a working client until they finish.
impl Drop for Runtime {
    fn drop(&mut self) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let adapter = Arc::clone(self.pipeline.adapter());
            handle.spawn(async move { adapter.close().await });
        }
    }
}

type BuildFn = dyn Fn(Arc<AppConfig>) -> Result<Runtime, Error> + Send + Sync;

/// Lazily built runtime, rebuilt on demand.
///
/// A replaced runtime is released once its last in-flight request drops
/// it; `invalidate` closes the adapter right away for orderly shutdown.
pub struct RuntimeCache {
    configs: ConfigCache,
    build: Box<BuildFn>,
    current: Mutex<Option<Arc<Runtime>>>,
}

impl RuntimeCache {
    pub fn new(configs: ConfigCache) -> Self {
        Self::with_builder(configs, Runtime::from_config)
    }

    /// Use a custom construction step (tests inject scripted pipelines).
    pub fn with_builder<F>(configs: ConfigCache, build: F) -> Self
    where
        F: Fn(Arc<AppConfig>) -> Result<Runtime, Error> + Send + Sync + 'static,
    {
        Self {
            configs,
            build: Box::new(build),
            current: Mutex::new(None),
        }
    }

    pub fn configs(&self) -> &ConfigCache {
        &self.configs
    }

    /// The current runtime, building it first when absent. `force_reload`
    /// re-reads the configuration and replaces the runtime; on failure the
    /// previous runtime stays in place.
    pub async fn get(&self, force_reload: bool) -> Result<Arc<Runtime>, Error> {
        let mut slot = self.current.lock().await;
        if !force_reload {
            if let Some(runtime) = slot.as_ref() {
                return Ok(Arc::clone(runtime));
            }
        }

        let config = self.configs.get(force_reload)?;
        let runtime = Arc::new((self.build)(config)?);
        info!(
            mode = %runtime.pipeline.adapter_mode(),
            evaluators = runtime.pipeline.panel().len(),
            force_reload,
            "Advisor runtime ready"
        );
        slot.replace(Arc::clone(&runtime));
        Ok(runtime)
    }

    /// Drop the runtime and cached config, releasing the adapter.
    pub async fn invalidate(&self) {
        if let Some(previous) = self.current.lock().await.take() {
            previous.pipeline.shutdown().await;
            info!("Advisor runtime released");
        }
        self.configs.invalidate();
    }

    pub async fn is_loaded(&self) -> bool {
        self.current.lock().await.is_some()
    }
}
