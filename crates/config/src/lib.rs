//! Configuration loading, validation, and caching for the advisor.
//!
//! Configuration lives in a TOML file (`$ADVISOR_CONFIG`, defaulting to
//! `config/advisor.toml`) with environment-variable overrides applied on
//! top. A missing file yields defaults; an invalid one is rejected at load.

mod cache;

pub use cache::ConfigCache;
pub use advisor_core::AdapterMode;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/advisor.toml";

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Completion capability settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Which completion adapter answers the draft, and how to reach it
    #[serde(default)]
    pub adapter: AdapterConfig,

    /// Values every agent role inherits unless it overrides them
    #[serde(default)]
    pub agent_defaults: AgentDefaults,

    /// Per-role overrides keyed by role name (`initial`, `structure`, ...)
    #[serde(default)]
    pub agents: BTreeMap<String, AgentRoleConfig>,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub guardrails: GuardrailsConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub turn_log: TurnLogConfig,

    /// Directory instruction files are resolved against (the config file's
    /// parent directory, or the working directory for defaults)
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("adapter", &self.adapter)
            .field("agent_defaults", &self.agent_defaults)
            .field("agents", &self.agents)
            .field("pipeline", &self.pipeline)
            .field("guardrails", &self.guardrails)
            .field("gateway", &self.gateway)
            .field("turn_log", &self.turn_log)
            .finish()
    }
}

// --- Provider ---

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Display name used in logs
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Bounded retries on transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_provider_name() -> String {
    "openai".into()
}
fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_url: default_api_url(),
            api_key: None,
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

// --- Adapter ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default)]
    pub mode: AdapterMode,

    #[serde(default)]
    pub remote: RemoteAdapterConfig,

    #[serde(default)]
    pub network: NetworkAdapterConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RemoteAdapterConfig {
    /// Server base URL; `/advisor/answer` is appended when missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Sent as `x-api-key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    5
}
fn default_read_timeout() -> u64 {
    20
}

impl Default for RemoteAdapterConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
        }
    }
}

impl std::fmt::Debug for RemoteAdapterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAdapterConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkAdapterConfig {
    /// Inline workflow definition (`{"entrypoint": ..., "nodes": {...}}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_json: Option<String>,

    /// Path to a workflow definition file, relative to the config directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_path: Option<String>,
}

// --- Agents ---

/// The agent roles the pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Initial,
    Structure,
    Precision,
    Focus,
    References,
    Temporal,
    Final,
    Expert,
}

impl AgentRole {
    pub const ALL: [AgentRole; 8] = [
        Self::Initial,
        Self::Structure,
        Self::Precision,
        Self::Focus,
        Self::References,
        Self::Temporal,
        Self::Final,
        Self::Expert,
    ];

    /// Panel members in their fixed evaluation order.
    pub const EVALUATORS: [AgentRole; 5] = [
        Self::Structure,
        Self::Precision,
        Self::Focus,
        Self::References,
        Self::Temporal,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Structure => "structure",
            Self::Precision => "precision",
            Self::Focus => "focus",
            Self::References => "references",
            Self::Temporal => "temporal",
            Self::Final => "final",
            Self::Expert => "expert",
        }
    }

    /// Accepts the canonical keys and the legacy `inicial`/`a1`..`a5` names.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "initial" | "inicial" => Some(Self::Initial),
            "structure" | "a1" | "estructura" => Some(Self::Structure),
            "precision" | "a2" => Some(Self::Precision),
            "focus" | "a3" | "enfoque" => Some(Self::Focus),
            "references" | "a4" | "referencias" => Some(Self::References),
            "temporal" | "temporal_validity" | "a5" => Some(Self::Temporal),
            "final" => Some(Self::Final),
            "expert" | "experto" => Some(Self::Expert),
            _ => None,
        }
    }

    pub fn is_evaluator(&self) -> bool {
        Self::EVALUATORS.contains(self)
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefaults {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.2
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// Per-role overrides. Unset fields inherit from [`AgentDefaults`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRoleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Inline instructions; ignored when `instructions_file` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Instruction file relative to the config directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Names of tools this role may call (e.g. `consult_expert`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,

    /// Whether the role answers with a JSON object (evaluators default to yes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<bool>,
}

/// A role's effective settings after inheritance and file loading.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAgent {
    pub role: AgentRole,
    pub model: String,

    /// Empty when neither inline nor file instructions were configured
    pub instructions: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub tools: Vec<String>,
    pub structured: bool,
}

// --- Pipeline ---

/// Prompt language for synthesis instructions and built-in defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Es,
    En,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Wall-clock budget for the parallel evaluator fan-out
    #[serde(default = "default_panel_timeout")]
    pub panel_timeout_secs: u64,

    #[serde(default)]
    pub language: Language,

    /// Overrides the built-in refusal text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal_message: Option<String>,

    /// Tool round-trips an agent may make before it must answer in text
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
}

fn default_panel_timeout() -> u64 {
    45
}
fn default_max_tool_rounds() -> u32 {
    4
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            panel_timeout_secs: default_panel_timeout(),
            language: Language::default(),
            refusal_message: None,
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

// --- Guardrails ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardrailsConfig {
    #[serde(default)]
    pub checks: Vec<CheckConfig>,
}

/// One safety check, as written in TOML. Typed and validated by the
/// guardrails crate when the gate is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    pub name: String,

    /// `keywords`, `pattern`, `classifier`, or `redact`
    pub kind: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub terms: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,

    /// Classifier model; falls back to the agent default model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Classifier instructions describing what to flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(default = "default_threshold")]
    pub threshold: f32,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_threshold() -> f32 {
    0.7
}
fn default_true() -> bool {
    true
}

// --- Gateway ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Expose `POST /admin/reload`
    #[serde(default)]
    pub enable_admin_routes: bool,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_admin_routes: false,
        }
    }
}

// --- Turn log ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnLogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Append-only JSONL file; omit to log turns through tracing only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonl_path: Option<String>,

    /// Recorded on every turn to tell deployments apart
    #[serde(default = "default_endpoint_source")]
    pub endpoint_source: String,
}

fn default_endpoint_source() -> String {
    "advisor".into()
}

impl Default for TurnLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jsonl_path: None,
            endpoint_source: default_endpoint_source(),
        }
    }
}

impl AppConfig {
    /// Load from `$ADVISOR_CONFIG` (or the default path) and apply
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("ADVISOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load_with_env(Path::new(&path))
    }

    /// Load a specific file and apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load a specific file without environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (highest priority).
    ///
    /// Recognized: `ADVISOR_API_KEY`/`OPENAI_API_KEY`, `ADVISOR_MODEL`,
    /// `ADVISOR_GENERATION_MODE`/`CHAT_GENERATOR`, `MCP_SERVER_URL`,
    /// `MCP_API_KEY`, `MCP_TIMEOUT_SECS`, `WORKFLOW_JSON`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("ADVISOR_API_KEY").or_else(|| get("OPENAI_API_KEY")) {
            self.provider.api_key = Some(key);
        }
        if let Some(model) = get("ADVISOR_MODEL") {
            self.agent_defaults.model = model;
        }
        if let Some(raw) = get("ADVISOR_GENERATION_MODE").or_else(|| get("CHAT_GENERATOR")) {
            self.adapter.mode = AdapterMode::parse(&raw).ok_or_else(|| {
                ConfigError::ValidationError(format!("unknown generation mode '{raw}'"))
            })?;
        }
        if let Some(url) = get("MCP_SERVER_URL") {
            self.adapter.remote.base_url = Some(url);
        }
        if let Some(key) = get("MCP_API_KEY") {
            self.adapter.remote.api_key = Some(key);
        }
        if let Some(raw) = get("MCP_TIMEOUT_SECS") {
            self.adapter.remote.read_timeout_secs = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("MCP_TIMEOUT_SECS must be an integer, got '{raw}'"))
            })?;
        }
        if let Some(json) = get("WORKFLOW_JSON") {
            self.adapter.network.workflow_json = Some(json);
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_temperature("agent_defaults.temperature", self.agent_defaults.temperature)?;

        for (key, role) in &self.agents {
            if AgentRole::parse(key).is_none() {
                return Err(ConfigError::ValidationError(format!("unknown agent role '{key}'")));
            }
            if let Some(t) = role.temperature {
                check_temperature(&format!("agents.{key}.temperature"), t)?;
            }
        }

        for (key, secs) in [
            ("pipeline.panel_timeout_secs", self.pipeline.panel_timeout_secs),
            ("provider.request_timeout_secs", self.provider.request_timeout_secs),
            ("adapter.remote.connect_timeout_secs", self.adapter.remote.connect_timeout_secs),
            ("adapter.remote.read_timeout_secs", self.adapter.remote.read_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::ValidationError(format!("{key} must be > 0")));
            }
        }

        match self.adapter.mode {
            AdapterMode::Remote if self.adapter.remote.base_url.is_none() => {
                return Err(ConfigError::ValidationError(
                    "adapter.mode = remote requires adapter.remote.base_url (or MCP_SERVER_URL)".into(),
                ));
            }
            AdapterMode::Network
                if self.adapter.network.workflow_json.is_none()
                    && self.adapter.network.workflow_path.is_none() =>
            {
                return Err(ConfigError::ValidationError(
                    "adapter.mode = network requires a workflow definition (or WORKFLOW_JSON)".into(),
                ));
            }
            _ => {}
        }

        for check in &self.guardrails.checks {
            if !(0.0..=1.0).contains(&check.threshold) {
                return Err(ConfigError::ValidationError(format!(
                    "guardrails check '{}' threshold must be between 0.0 and 1.0",
                    check.name
                )));
            }
        }

        Ok(())
    }

    /// Overrides for a role, accepting legacy key spellings.
    fn role_config(&self, role: AgentRole) -> Option<&AgentRoleConfig> {
        self.agents
            .iter()
            .find(|(key, _)| AgentRole::parse(key) == Some(role))
            .map(|(_, cfg)| cfg)
    }

    /// Effective settings for a role, reading its instruction file if any.
    pub fn resolve_agent(&self, role: AgentRole) -> Result<ResolvedAgent, ConfigError> {
        let defaults = &self.agent_defaults;
        let overrides = self.role_config(role).cloned().unwrap_or_default();

        let instructions = match (&overrides.instructions_file, &overrides.instructions) {
            (Some(file), _) => {
                let path = self.resolve_relative(file)?;
                std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
                    path,
                    reason: e.to_string(),
                })?
            }
            (None, Some(inline)) => inline.clone(),
            (None, None) => String::new(),
        };

        Ok(ResolvedAgent {
            role,
            model: overrides.model.unwrap_or_else(|| defaults.model.clone()),
            instructions,
            temperature: overrides.temperature.unwrap_or(defaults.temperature),
            max_tokens: overrides.max_tokens.or(defaults.max_tokens),
            tools: overrides.tools,
            structured: overrides.structured.unwrap_or(role.is_evaluator()),
        })
    }

    /// Resolve a path relative to the config directory, refusing anything
    /// that would escape it.
    pub fn resolve_relative(&self, relative: &str) -> Result<PathBuf, ConfigError> {
        let rel = Path::new(relative);
        let escapes = rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_) | Component::RootDir));
        if escapes {
            return Err(ConfigError::ValidationError(format!(
                "path '{relative}' must stay inside the config directory"
            )));
        }
        let base = self.base_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        Ok(base.join(rel))
    }

    /// Render as TOML with secrets removed (for `config show`).
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut copy = self.clone();
        let mask = |s: &mut Option<String>| {
            if s.is_some() {
                *s = Some("[REDACTED]".into());
            }
        };
        mask(&mut copy.provider.api_key);
        mask(&mut copy.adapter.remote.api_key);
        toml::to_string_pretty(&copy).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn check_temperature(field: &str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=2.0).contains(&value) {
        return Err(ConfigError::ValidationError(format!(
            "{field} must be between 0.0 and 2.0"
        )));
    }
    Ok(())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            adapter: AdapterConfig::default(),
            agent_defaults: AgentDefaults::default(),
            agents: BTreeMap::new(),
            pipeline: PipelineConfig::default(),
            guardrails: GuardrailsConfig::default(),
            gateway: GatewayConfig::default(),
            turn_log: TurnLogConfig::default(),
            base_dir: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for advisor_core::Error {
    fn from(e: ConfigError) -> Self {
        advisor_core::Error::Config {
            message: e.to_string(),
        }
    }
}
