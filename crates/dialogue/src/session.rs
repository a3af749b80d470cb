//! Per-session mutable state of a dialogue.

use serde::Serialize;

/// Where the orchestrator's state machine currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DialogueState {
    #[default]
    Idle,
    Running {
        iteration: u32,
    },
    Completed {
        iteration: u32,
    },
    Exhausted {
        iterations: u32,
    },
    /// The consumer stopped reading before the loop finished.
    Abandoned {
        iteration: u32,
    },
}

impl DialogueState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Exhausted { .. } | Self::Abandoned { .. }
        )
    }
}

/// One conversation thread driving a task to completion.
///
/// Written only by the orchestrator's loop; callers see snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DialogueSession {
    pub task_id: String,
    pub session_id: String,
    pub original_request: String,
    /// Starts at 0; never exceeds `max_iterations`.
    pub current_iteration: u32,
    pub max_iterations: u32,
    /// Captured executor output of the last finished iteration.
    pub previous_execution_output: Option<String>,
    pub plan_saved: bool,
    /// Whether the current iteration signalled completion.
    pub done: bool,
    pub state: DialogueState,
}

impl DialogueSession {
    pub fn new(
        task_id: impl Into<String>,
        session_id: impl Into<String>,
        original_request: impl Into<String>,
        max_iterations: u32,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            session_id: session_id.into(),
            original_request: original_request.into(),
            max_iterations,
            ..Self::default()
        }
    }

    /// Advance to the next iteration and clear its done flag.
    pub fn begin_iteration(&mut self) -> u32 {
        self.current_iteration += 1;
        self.done = false;
        self.state = DialogueState::Running {
            iteration: self.current_iteration,
        };
        self.current_iteration
    }

    /// Record the end of the current iteration.
    pub fn finish_iteration(&mut self, captured_output: String, done: bool) {
        self.previous_execution_output = Some(captured_output);
        self.done = done;
    }
}
