//! [`disclaude_core::AgentCapability`] implementations.

pub mod llm;
pub mod subtask;

pub use llm::LlmCapability;
pub use subtask::{SubtaskCapability, parse_subtasks};
