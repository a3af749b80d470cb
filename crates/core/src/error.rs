//! Error types for the Disclaude domain.
//!
//! Each bounded context has its own `thiserror` enum; the top-level
//! [`Error`] wraps them with `#[from]` conversions.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all Disclaude operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Task specification error: {0}")]
    TaskSpec(#[from] TaskSpecError),

    #[error("Plan store error: {0}")]
    PlanStore(#[from] PlanStoreError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by an agent capability, either when invoked or mid-stream.
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("{capability} failed to start: {reason}")]
    InvokeFailed { capability: String, reason: String },

    #[error("{capability} stream failed: {reason}")]
    StreamFailed { capability: String, reason: String },

    #[error("{capability} timed out after {timeout_secs}s")]
    Timeout { capability: String, timeout_secs: u64 },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Problems reading or parsing a task specification document.
#[derive(Debug, Error)]
pub enum TaskSpecError {
    #[error("Failed to read task specification at {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("Task specification at {path} is missing the '{field}' field")]
    MissingField { path: PathBuf, field: &'static str },

    #[error("Cannot derive a task id from {path}")]
    NoTaskId { path: PathBuf },
}

/// Failures of the plan persistence collaborator.
#[derive(Debug, Error)]
pub enum PlanStoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to serialize plan: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_error_displays_role() {
        let err = CapabilityError::StreamFailed {
            capability: "executor".into(),
            reason: "connection reset".into(),
        };
        assert_eq!(err.to_string(), "executor stream failed: connection reset");
    }

    #[test]
    fn provider_error_converts_into_capability_error() {
        let err: CapabilityError = ProviderError::ApiError {
            status_code: 529,
            message: "Overloaded".into(),
        }
        .into();
        assert!(err.to_string().contains("529"));
        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn task_spec_error_names_field() {
        let err = Error::TaskSpec(TaskSpecError::MissingField {
            path: PathBuf::from("tasks/abc/Task.md"),
            field: "Original Request",
        });
        assert!(err.to_string().contains("Original Request"));
        assert!(err.to_string().contains("tasks/abc/Task.md"));
    }
}
