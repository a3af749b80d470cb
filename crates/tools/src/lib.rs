//! Built-in tool implementations for Disclaude.
//!
//! The reserved completion tool plus workspace-scoped file access. The
//! caller that builds a capability registers these explicitly; nothing is
//! wired through global state.

pub mod file_read;
pub mod file_write;
pub mod task_done;
pub mod workspace;

use std::path::PathBuf;

use disclaude_core::tool::ToolRegistry;

pub use task_done::{DEFAULT_TASK_DONE_TOOL, TaskDoneTool};
pub use workspace::{Workspace, WorkspacePathError};

/// Create a registry with the completion tool and the file tools.
pub fn default_registry(workspace_root: impl Into<PathBuf>, completion_tool: &str) -> ToolRegistry {
    let workspace = Workspace::new(workspace_root);
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(TaskDoneTool::new(completion_tool)));
    registry.register(Box::new(file_read::FileReadTool::new(workspace.clone())));
    registry.register(Box::new(file_write::FileWriteTool::new(workspace)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_builtin_tools() {
        let registry = default_registry("/tmp/ws", "finish_task");
        assert_eq!(
            registry.names(),
            vec!["file_read", "file_write", "finish_task"]
        );
    }
}
