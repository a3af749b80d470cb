//! Messages on the live progress stream of a dialogue.
//!
//! A [`DialogueMessage`] is transient: it is produced by an agent capability,
//! forwarded by the dialogue loop, and rendered by the caller. It is never
//! persisted.

use serde::{Deserialize, Serialize};

use crate::message::Role;

/// Tag reserved for an explicit completion signal from the Evaluator.
pub const TASK_COMPLETION_TAG: &str = "task_completion";

/// What a dialogue message carries.
///
/// Closed set: completion detection matches on this exhaustively instead of
/// probing loosely-typed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain assistant text.
    Text,

    /// The capability invoked a tool.
    ToolUse {
        tool: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    /// A capability failure surfaced inline.
    Error,

    /// The Evaluator declares the task complete.
    TaskCompletion,
}

/// One unit of the progress stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueMessage {
    pub content: String,

    /// Always `assistant` for loop output.
    pub role: Role,

    #[serde(flatten)]
    pub kind: MessageKind,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Position in the forwarded stream, stamped when the message is forwarded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

impl DialogueMessage {
    fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: Role::Assistant,
            kind,
            metadata: serde_json::Map::new(),
            sequence: None,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Text, content)
    }

    /// A tool invocation. `content` is a short human-readable description.
    pub fn tool_use(tool: impl Into<String>, input: serde_json::Value) -> Self {
        let tool = tool.into();
        let content = format!("Using tool: {tool}");
        let name = serde_json::Value::String(tool.clone());
        Self::new(MessageKind::ToolUse { tool, input }, content).with_metadata("tool_name", name)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Error, content)
    }

    pub fn task_completion(content: impl Into<String>) -> Self {
        Self::new(MessageKind::TaskCompletion, content)
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The free-form message type tag (`text`, `tool_use`, `error`, `task_completion`).
    pub fn message_type(&self) -> &'static str {
        match self.kind {
            MessageKind::Text => "text",
            MessageKind::ToolUse { .. } => "tool_use",
            MessageKind::Error => "error",
            MessageKind::TaskCompletion => TASK_COMPLETION_TAG,
        }
    }

    /// Name of the invoked tool, if this is a tool invocation.
    pub fn tool_name(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::ToolUse { tool, .. } => Some(tool),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, MessageKind::Text)
    }
}
