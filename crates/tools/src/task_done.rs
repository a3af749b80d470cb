//! The reserved "mark task done" tool.
//!
//! Executing it does nothing beyond acknowledging; the dialogue loop watches
//! for the tool *invocation* in the capability's stream and treats it as a
//! completion signal.

use async_trait::async_trait;
use disclaude_core::error::ToolError;
use disclaude_core::tool::{Tool, ToolResult};

pub const DEFAULT_TASK_DONE_TOOL: &str = "task_done";

pub struct TaskDoneTool {
    name: String,
}

impl TaskDoneTool {
    /// `name` must match the dialogue's configured completion tool.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for TaskDoneTool {
    fn default() -> Self {
        Self::new(DEFAULT_TASK_DONE_TOOL)
    }
}

#[async_trait]
impl Tool for TaskDoneTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Call this only when the task's original request has been fully satisfied. \
         Ends the dialogue."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "One or two sentences on what was delivered"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let summary = arguments["summary"].as_str().unwrap_or("Task complete");
        tracing::info!(tool = %self.name, summary, "Task marked done");
        Ok(ToolResult::ok(format!("Task marked done: {summary}")))
    }
}
