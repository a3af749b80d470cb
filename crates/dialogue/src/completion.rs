//! Completion-signal detection.
//!
//! Two heterogeneous signals mark an iteration complete:
//!
//! 1. an invocation of the reserved "mark task done" tool
//! 2. a message tagged `task_completion`
//!
//! Both are detected; neither takes precedence over the other.

use disclaude_core::{DialogueMessage, MessageKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionSignal {
    /// The reserved completion tool was invoked.
    DoneTool,
    /// A message carried the `task_completion` tag.
    CompletionTag,
}

#[derive(Debug, Clone)]
pub struct CompletionDetector {
    tool_name: String,
}

impl CompletionDetector {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn detect(&self, message: &DialogueMessage) -> Option<CompletionSignal> {
        match &message.kind {
            MessageKind::ToolUse { tool, .. } if self.is_done_tool(tool) => {
                Some(CompletionSignal::DoneTool)
            }
            MessageKind::TaskCompletion => Some(CompletionSignal::CompletionTag),
            MessageKind::Text | MessageKind::ToolUse { .. } | MessageKind::Error => None,
        }
    }

    /// Exact match, or a namespaced name such as `mcp__disclaude__task_done`.
    fn is_done_tool(&self, tool: &str) -> bool {
        tool == self.tool_name
            || tool
                .rsplit_once("__")
                .is_some_and(|(_, name)| name == self.tool_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn done_tool_is_a_signal() {
        let detector = CompletionDetector::new("task_done");
        let msg = DialogueMessage::tool_use("task_done", json!({}));
        assert_eq!(detector.detect(&msg), Some(CompletionSignal::DoneTool));
    }

    #[test]
    fn namespaced_done_tool_is_a_signal() {
        let detector = CompletionDetector::new("task_done");
        let msg = DialogueMessage::tool_use("mcp__disclaude__task_done", json!({}));
        assert_eq!(detector.detect(&msg), Some(CompletionSignal::DoneTool));
    }

    #[test]
    fn completion_tag_is_a_signal() {
        let detector = CompletionDetector::new("task_done");
        let msg = DialogueMessage::task_completion("Everything is in place");
        assert_eq!(detector.detect(&msg), Some(CompletionSignal::CompletionTag));
    }

    #[test]
    fn other_messages_are_not() {
        let detector = CompletionDetector::new("task_done");
        assert_eq!(detector.detect(&DialogueMessage::text("task_done")), None);
        assert_eq!(detector.detect(&DialogueMessage::error("task_done")), None);
        assert_eq!(
            detector.detect(&DialogueMessage::tool_use("file_write", json!({}))),
            None
        );
        assert_eq!(
            detector.detect(&DialogueMessage::tool_use("not_task_done", json!({}))),
            None
        );
    }
}
