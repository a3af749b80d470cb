//! Workspace confinement for the file tools.
//!
//! Relative paths resolve against the workspace root. Absolute paths must
//! already lie inside it. `..` components are rejected outright.

use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WorkspacePathError {
    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Path '{path}' is outside the workspace")]
    OutsideWorkspace { path: String },

    #[error("Path is empty")]
    Empty,
}

/// A directory the file tools are confined to.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a tool-supplied path to a location inside the workspace.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, WorkspacePathError> {
        if path.trim().is_empty() {
            return Err(WorkspacePathError::Empty);
        }

        let input = Path::new(path);
        if input
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(WorkspacePathError::PathTraversal { path: path.into() });
        }

        if input.is_absolute() {
            if input.starts_with(&self.root) {
                return Ok(input.to_path_buf());
            }
            return Err(WorkspacePathError::OutsideWorkspace { path: path.into() });
        }

        Ok(self.root.join(input))
    }
}
