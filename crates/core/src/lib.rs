//! # Disclaude Core
//!
//! Domain types, traits, and error definitions shared by every Disclaude
//! crate. The dialogue loop, the providers, the tools and the stores all
//! depend inward on this crate.
//!
//! ## Seams
//!
//! - [`AgentCapability`]: turns a prompt into a live stream of
//!   [`DialogueMessage`]s (Evaluator and Planner/Executor roles)
//! - [`Provider`]: an LLM backend
//! - [`Tool`]: something a capability can invoke
//! - [`PlanStore`]: where an extracted [`TaskPlan`] is persisted

pub mod capability;
pub mod dialogue;
pub mod error;
pub mod event;
pub mod message;
pub mod plan;
pub mod provider;
pub mod task;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use capability::{AgentCapability, CapabilityConfig, CapabilityRole, CapabilityStream};
pub use dialogue::{DialogueMessage, MessageKind, TASK_COMPLETION_TAG};
pub use error::{
    CapabilityError, Error, PlanStoreError, ProviderError, Result, TaskSpecError, ToolError,
};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, MessageToolCall, Role};
pub use plan::{PlanStore, PlanSubtask, TaskPlan};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use task::TaskSpecification;
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
