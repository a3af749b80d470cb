//! # Disclaude Dialogue
//!
//! The dialogue control loop: given a task specification, alternate an
//! Evaluator and a Planner/Executor capability until the task is marked
//! done or the iteration budget runs out, streaming every intermediate
//! message to the caller as it happens.
//!
//! ## Pieces
//!
//! - [`MessageTracker`]: suppresses replayed messages within a session
//! - [`extract_plan`]: best-effort [`disclaude_core::TaskPlan`] extraction
//! - [`IterationBridge`]: one Evaluator + Planner/Executor cycle
//! - [`DialogueOrchestrator`]: the iteration state machine and entry point
//! - [`capability`]: LLM-backed and subtask-decomposing capabilities
//!
//! ```no_run
//! # async fn demo(
//! #     evaluator: std::sync::Arc<dyn disclaude_core::AgentCapability>,
//! #     executor: std::sync::Arc<dyn disclaude_core::AgentCapability>,
//! # ) -> Result<(), disclaude_dialogue::DialogueError> {
//! use disclaude_dialogue::DialogueOrchestrator;
//!
//! let orchestrator = DialogueOrchestrator::new(evaluator, executor);
//! let mut stream = orchestrator
//!     .run_dialogue("tasks/om_1.md".as_ref(), "write hello.txt", "chat-1")
//!     .await?;
//! while let Some(message) = stream.recv().await {
//!     println!("[{}] {}", message.message_type(), message.content);
//! }
//! let outcome = stream.finish().await?;
//! println!("{outcome}");
//! orchestrator.cleanup();
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod capability;
pub mod completion;
pub mod error;
pub mod orchestrator;
pub mod plan_extractor;
pub mod prompts;
pub mod session;
pub mod stream;
pub mod tracker;

#[cfg(any(test, feature = "test-util"))]
pub mod test_helpers;

pub use bridge::{CapabilityPair, IterationBridge, IterationRecord};
pub use capability::{LlmCapability, SubtaskCapability};
pub use completion::{CompletionDetector, CompletionSignal};
pub use error::DialogueError;
pub use orchestrator::{DialogueOrchestrator, DialogueOutcome, DialogueSettings};
pub use plan_extractor::extract_plan;
pub use session::{DialogueSession, DialogueState};
pub use stream::DialogueStream;
pub use tracker::MessageTracker;
