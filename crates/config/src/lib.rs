//! Configuration loading, validation, and management for Disclaude.
//!
//! Loads configuration from `~/.disclaude/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default base URL of the GLM Anthropic-compatible endpoint.
pub const GLM_DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/anthropic";
const GLM_DEFAULT_MODEL: &str = "glm-4.7";

/// The root configuration structure.
///
/// Maps directly to `~/.disclaude/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM backend settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Dialogue loop settings
    #[serde(default)]
    pub dialogue: DialogueConfig,

    /// Filesystem layout
    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Anthropic API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// GLM API key. Preferred over `api_key` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glm_api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_glm_model")]
    pub glm_model: String,

    /// Override for the Anthropic endpoint (proxies, tests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_glm_base_url")]
    pub glm_base_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "claude-3-5-sonnet-20241022".into()
}
fn default_glm_model() -> String {
    GLM_DEFAULT_MODEL.into()
}
fn default_glm_base_url() -> String {
    GLM_DEFAULT_BASE_URL.into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            glm_api_key: None,
            model: default_model(),
            glm_model: default_glm_model(),
            base_url: None,
            glm_base_url: default_glm_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("api_key", &redact(&self.api_key))
            .field("glm_api_key", &redact(&self.glm_api_key))
            .field("model", &self.model)
            .field("glm_model", &self.glm_model)
            .field("base_url", &self.base_url)
            .field("glm_base_url", &self.glm_base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    /// Iteration budget per dialogue
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Name of the reserved "mark task done" tool
    #[serde(default = "default_completion_tool")]
    pub completion_tool: String,

    /// Text that, when the Evaluator replies with it, signals completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_marker: Option<String>,

    #[serde(default = "default_evaluator_max_turns")]
    pub evaluator_max_turns: u32,

    #[serde(default = "default_executor_max_turns")]
    pub executor_max_turns: u32,

    /// Buffer size of the dialogue progress stream
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Keys remembered by the message de-duplication tracker
    #[serde(default = "default_tracker_capacity")]
    pub tracker_capacity: usize,

    /// Decompose executor work into subtasks run one by one
    #[serde(default)]
    pub decompose_subtasks: bool,
}

fn default_max_iterations() -> u32 {
    20
}
fn default_completion_tool() -> String {
    "task_done".into()
}
fn default_evaluator_max_turns() -> u32 {
    4
}
fn default_executor_max_turns() -> u32 {
    10
}
fn default_channel_capacity() -> usize {
    64
}
fn default_tracker_capacity() -> usize {
    4096
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            completion_tool: default_completion_tool(),
            completion_marker: None,
            evaluator_max_turns: default_evaluator_max_turns(),
            executor_max_turns: default_executor_max_turns(),
            channel_capacity: default_channel_capacity(),
            tracker_capacity: default_tracker_capacity(),
            decompose_subtasks: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory the file tools are confined to
    #[serde(default = "default_workspace_dir")]
    pub dir: PathBuf,

    /// Task specifications and plans live under here
    #[serde(default = "default_tasks_dir")]
    pub tasks_dir: PathBuf,

    /// Chat id -> session id map
    #[serde(default = "default_sessions_file")]
    pub sessions_file: PathBuf,
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("./workspace")
}
fn default_tasks_dir() -> PathBuf {
    PathBuf::from("./workspace/tasks")
}
fn default_sessions_file() -> PathBuf {
    PathBuf::from("./sessions.json")
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            dir: default_workspace_dir(),
            tasks_dir: default_tasks_dir(),
            sessions_file: default_sessions_file(),
        }
    }
}

/// The backend the agent capabilities will talk to, after env resolution.
#[derive(Clone, PartialEq)]
pub struct ResolvedAgent {
    /// "glm" or "anthropic"
    pub provider: String,
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
}

impl std::fmt::Debug for ResolvedAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedAgent")
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.disclaude/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `GLM_API_KEY`, `GLM_MODEL`, `GLM_API_BASE_URL`
    /// - `ANTHROPIC_API_KEY`, `CLAUDE_MODEL`
    /// - `AGENT_WORKSPACE`, `SESSION_PERSISTENCE_PATH`
    /// - `DISCLAUDE_MAX_ITERATIONS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
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

    /// Apply overrides from an environment lookup.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("GLM_API_KEY") {
            self.agent.glm_api_key = Some(key);
        }
        if let Some(model) = var("GLM_MODEL") {
            self.agent.glm_model = model;
        }
        if let Some(url) = var("GLM_API_BASE_URL") {
            self.agent.glm_base_url = url;
        }
        if let Some(key) = var("ANTHROPIC_API_KEY") {
            self.agent.api_key = Some(key);
        }
        if let Some(model) = var("CLAUDE_MODEL") {
            self.agent.model = model;
        }
        if let Some(dir) = var("AGENT_WORKSPACE") {
            let dir = PathBuf::from(dir);
            self.workspace.tasks_dir = dir.join("tasks");
            self.workspace.dir = dir;
        }
        if let Some(path) = var("SESSION_PERSISTENCE_PATH") {
            self.workspace.sessions_file = PathBuf::from(path);
        }
        if let Some(raw) = var("DISCLAUDE_MAX_ITERATIONS") {
            self.dialogue.max_iterations = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "DISCLAUDE_MAX_ITERATIONS must be a positive integer, got '{raw}'"
                ))
            })?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".disclaude")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.temperature < 0.0 || self.agent.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "agent.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.dialogue.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "dialogue.max_iterations must be at least 1".into(),
            ));
        }

        if self.dialogue.completion_tool.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "dialogue.completion_tool must not be empty".into(),
            ));
        }

        if self.dialogue.channel_capacity == 0 || self.dialogue.tracker_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "dialogue channel and tracker capacities must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Pick the backend: GLM when its key is set, else Anthropic.
    pub fn resolve_agent(&self) -> Result<ResolvedAgent, ConfigError> {
        if let Some(key) = &self.agent.glm_api_key {
            return Ok(ResolvedAgent {
                provider: "glm".into(),
                api_key: key.clone(),
                model: self.agent.glm_model.clone(),
                base_url: Some(self.agent.glm_base_url.clone()),
            });
        }
        if let Some(key) = &self.agent.api_key {
            return Ok(ResolvedAgent {
                provider: "anthropic".into(),
                api_key: key.clone(),
                model: self.agent.model.clone(),
                base_url: self.agent.base_url.clone(),
            });
        }
        Err(ConfigError::MissingApiKey)
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.agent.glm_api_key.is_some() || self.agent.api_key.is_some()
    }

    /// Generate a default config TOML string (for `config --init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
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

    #[error("No API key configured: set GLM_API_KEY or ANTHROPIC_API_KEY")]
    MissingApiKey,
}
