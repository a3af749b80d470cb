use disclaude_core::TaskSpecError;

/// Errors returned by [`crate::DialogueOrchestrator::run_dialogue`] before
/// any message is streamed, and by [`crate::DialogueStream::finish`].
///
/// Capability failures are not here: they are forwarded inline as
/// error-tagged messages.
#[derive(Debug, thiserror::Error)]
pub enum DialogueError {
    #[error(transparent)]
    TaskSpec(#[from] TaskSpecError),

    #[error("Dialogue session '{session_id}' is already running on this orchestrator")]
    AlreadyRunning { session_id: String },

    #[error("Dialogue loop failed: {0}")]
    LoopFailed(String),
}
