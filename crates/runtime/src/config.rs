//! Configuration loading from TOML.

use crate::tools::DispatchOptions;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub backend: BackendConfig,
}

/// Round-loop limits and dispatch behavior.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum action-required rounds per message.
    pub max_rounds: u32,

    /// Extra runs allowed after a structured reply fails validation.
    pub structured_retries: u32,

    /// Per-call dispatch timeout in seconds.
    pub tool_timeout_secs: u64,

    /// Upper bound on a whole round of tool calls, in seconds.
    pub round_timeout_secs: u64,

    /// Run the calls of a round concurrently.
    pub parallel_dispatch: bool,

    /// Tell the backend which keys were missing before retrying.
    pub retry_feedback: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: 16,
            structured_retries: 2,
            tool_timeout_secs: 30,
            round_timeout_secs: 120,
            parallel_dispatch: true,
            retry_feedback: true,
        }
    }
}

impl OrchestratorConfig {
    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            timeout: Duration::from_secs(self.tool_timeout_secs),
            round_timeout: Duration::from_secs(self.round_timeout_secs),
            parallel: self.parallel_dispatch,
        }
    }
}

/// Reasoning backend connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,

    pub model: String,

    /// Display name of the backend agent created per session.
    pub assistant_name: String,

    /// API key. Falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,

    pub poll_interval_ms: u64,

    pub poll_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            assistant_name: "Switchboard assistant".to_string(),
            api_key: None,
            poll_interval_ms: 500,
            poll_timeout_secs: 120,
        }
    }
}

impl BackendConfig {
    /// Resolve the API key from config, then the environment.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .ok_or(ConfigError::MissingAuth)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("authentication not configured: set backend.api_key or OPENAI_API_KEY")]
    MissingAuth,
}
