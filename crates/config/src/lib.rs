//! Configuration loading and validation for clawflow.
//!
//! Loads configuration from `~/.clawflow/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use clawflow_core::provider::ToolChoice;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.clawflow/config.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// The OpenAI-compatible chat endpoint
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Planning flow settings
    #[serde(default)]
    pub flow: FlowConfig,

    /// Remote tool servers
    #[serde(default)]
    pub mcp: McpConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    500
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries for transient failures (network, timeout, rate limit)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .finish()
    }
}

/// Which output an agent run produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    ToolCalling,
    Summarizing,
}

fn default_max_steps() -> usize {
    30
}
fn default_duplicate_threshold() -> usize {
    2
}
fn default_memory_max_messages() -> usize {
    100
}
fn default_remote_refresh_interval() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Identical assistant replies that count as stuck
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: usize,

    /// Truncate tool observations to this many characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_observe: Option<usize>,

    #[serde(default = "default_memory_max_messages")]
    pub memory_max_messages: usize,

    #[serde(default)]
    pub tool_choice: ToolChoice,

    #[serde(default)]
    pub strategy: StrategyKind,

    /// Steps between remote tool refreshes; 0 refreshes only on the first step
    #[serde(default = "default_remote_refresh_interval")]
    pub remote_refresh_interval: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            duplicate_threshold: default_duplicate_threshold(),
            max_observe: None,
            memory_max_messages: default_memory_max_messages(),
            tool_choice: ToolChoice::Auto,
            strategy: StrategyKind::default(),
            remote_refresh_interval: default_remote_refresh_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Executor agent names, in fallback order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub executors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
}

impl FlowConfig {
    /// Executor names with the single default `executor` when none are set.
    pub fn executor_names(&self) -> Vec<String> {
        if self.executors.is_empty() {
            vec!["executor".into()]
        } else {
            self.executors.clone()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub servers: BTreeMap<String, McpServerConfig>,
}

/// How to reach one remote tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum McpServerConfig {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
    Sse {
        url: String,
    },
}

/// Server ids become tool-name prefixes, so they stay within `[A-Za-z0-9-]+`.
pub fn is_valid_server_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl AppConfig {
    /// Load configuration from the default path (~/.clawflow/config.toml).
    ///
    /// Environment variables override the file:
    /// - `CLAWFLOW_API_KEY` (falling back to `OPENAI_API_KEY`)
    /// - `CLAWFLOW_BASE_URL`
    /// - `CLAWFLOW_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("CLAWFLOW_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.provider.api_key = Some(key);
        }
        if let Some(url) = lookup("CLAWFLOW_BASE_URL") {
            self.provider.base_url = url;
        }
        if let Some(model) = lookup("CLAWFLOW_MODEL") {
            self.provider.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".clawflow")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.duplicate_threshold < 1 {
            return Err(ConfigError::ValidationError(
                "agent.duplicate_threshold must be at least 1".into(),
            ));
        }
        if self.agent.memory_max_messages < 2 {
            return Err(ConfigError::ValidationError(
                "agent.memory_max_messages must be at least 2".into(),
            ));
        }
        if let Some(bad) = self.mcp.servers.keys().find(|id| !is_valid_server_id(id)) {
            return Err(ConfigError::ValidationError(format!(
                "mcp server id '{bad}' may only contain letters, digits and '-'"
            )));
        }
        let names = self.flow.executor_names();
        if let Some(primary) = &self.flow.primary
            && !names.contains(primary)
        {
            return Err(ConfigError::ValidationError(format!(
                "flow.primary '{primary}' is not one of flow.executors"
            )));
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Render the defaults as TOML (for `config init`).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// Render this config as TOML with secrets redacted (for `config show`).
    pub fn redacted_toml(&self) -> String {
        let mut shown = self.clone();
        if shown.provider.api_key.is_some() {
            shown.provider.api_key = Some("[REDACTED]".into());
        }
        toml::to_string_pretty(&shown).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
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
