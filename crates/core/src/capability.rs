//! Agent capability trait: the seam between the dialogue loop and whatever
//! actually reasons and acts.
//!
//! A capability is invoked once per iteration with a prompt and a
//! role-specific configuration, and answers with a live stream of
//! [`DialogueMessage`]s. A mid-stream failure arrives as an `Err` item; a
//! failure to start is the `Err` of [`AgentCapability::invoke`] itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::dialogue::DialogueMessage;
use crate::error::CapabilityError;

/// The live stream returned by a capability.
pub type CapabilityStream = mpsc::Receiver<Result<DialogueMessage, CapabilityError>>;

/// Which role a capability plays within an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityRole {
    /// Judges whether the task is complete.
    Evaluator,
    /// Does the task's actual work.
    Executor,
}

impl std::fmt::Display for CapabilityRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Evaluator => write!(f, "evaluator"),
            Self::Executor => write!(f, "executor"),
        }
    }
}

/// Capability-specific configuration passed with every invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityConfig {
    pub role: CapabilityRole,

    /// System prompt for the role.
    #[serde(default)]
    pub system_prompt: String,

    /// Model override; `None` uses the capability's default model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Tool names the capability may use. Empty = every registered tool.
    #[serde(default)]
    pub allowed_tools: Vec<String>,

    /// `false` hides every tool regardless of `allowed_tools`.
    #[serde(default = "default_tools_enabled")]
    pub tools_enabled: bool,

    /// Upper bound on model turns within one invocation.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Text that, when present in a reply, is surfaced as an explicit
    /// completion message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_marker: Option<String>,

    /// Dialogue session the invocation belongs to (routing only).
    #[serde(default)]
    pub session_id: String,

    /// Iteration the invocation belongs to (routing only).
    #[serde(default)]
    pub iteration: u32,
}

fn default_max_turns() -> u32 {
    10
}

fn default_tools_enabled() -> bool {
    true
}

impl CapabilityConfig {
    pub fn new(role: CapabilityRole) -> Self {
        Self {
            role,
            system_prompt: String::new(),
            model: None,
            allowed_tools: Vec::new(),
            tools_enabled: true,
            max_turns: default_max_turns(),
            completion_marker: None,
            session_id: String::new(),
            iteration: 0,
        }
    }

    pub fn evaluator() -> Self {
        Self::new(CapabilityRole::Evaluator)
    }

    pub fn executor() -> Self {
        Self::new(CapabilityRole::Executor)
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_allowed_tools(mut self, tools: Vec<String>) -> Self {
        self.allowed_tools = tools;
        self
    }

    /// Plain text generation: no tool is offered or executed.
    pub fn without_tools(mut self) -> Self {
        self.tools_enabled = false;
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_completion_marker(mut self, marker: impl Into<String>) -> Self {
        self.completion_marker = Some(marker.into());
        self
    }

    /// Copy of this configuration routed to one session iteration.
    pub fn for_iteration(&self, session_id: &str, iteration: u32) -> Self {
        let mut config = self.clone();
        config.session_id = session_id.to_string();
        config.iteration = iteration;
        config
    }

    /// Whether `tool` is usable under this configuration.
    pub fn allows_tool(&self, tool: &str) -> bool {
        self.tools_enabled
            && (self.allowed_tools.is_empty() || self.allowed_tools.iter().any(|t| t == tool))
    }
}

/// An external delegate that turns a prompt into a stream of tagged messages.
///
/// Must tolerate repeated invocation: the loop calls it fresh every
/// iteration, with no session affinity.
#[async_trait]
pub trait AgentCapability: Send + Sync {
    /// A human-readable name (used in logs and error messages).
    fn name(&self) -> &str;

    /// Start the capability and return its message stream.
    async fn invoke(
        &self,
        prompt: String,
        config: &CapabilityConfig,
    ) -> Result<CapabilityStream, CapabilityError>;
}
