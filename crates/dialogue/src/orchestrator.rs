//! Dialogue Orchestrator: the iteration state machine.
//!
//! ```text
//! Idle -> Running(1..=max_iterations) -> Completed | Exhausted
//!                                     \-> Abandoned (consumer went away)
//! ```
//!
//! Each iteration runs one [`IterationBridge`] to exhaustion, forwarding
//! every new message to the caller as it is produced. Iteration 1 also
//! gets one best-effort attempt at extracting and persisting a plan. The
//! loop stops on the first iteration that signals completion, or when the
//! iteration budget is spent.
//!
//! One orchestrator drives one session at a time. Per-session state lives
//! behind the orchestrator and is cleared by [`DialogueOrchestrator::cleanup`].

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use disclaude_config::DialogueConfig;
use disclaude_core::{
    AgentCapability, CapabilityConfig, DialogueMessage, DomainEvent, EventBus, PlanStore,
    TaskSpecification,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bridge::{CapabilityPair, IterationBridge};
use crate::completion::CompletionDetector;
use crate::error::DialogueError;
use crate::plan_extractor::extract_plan;
use crate::session::{DialogueSession, DialogueState};
use crate::stream::DialogueStream;
use crate::tracker::{DEFAULT_TRACKER_CAPACITY, MessageTracker};

/// Loop tunables.
#[derive(Debug, Clone)]
pub struct DialogueSettings {
    pub max_iterations: u32,
    /// Name of the reserved "mark task done" tool.
    pub completion_tool: String,
    /// Buffer between the loop and the caller.
    pub channel_capacity: usize,
    pub tracker_capacity: usize,
}

impl Default for DialogueSettings {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            completion_tool: "task_done".into(),
            channel_capacity: 64,
            tracker_capacity: DEFAULT_TRACKER_CAPACITY,
        }
    }
}

impl From<&DialogueConfig> for DialogueSettings {
    fn from(config: &DialogueConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            completion_tool: config.completion_tool.clone(),
            channel_capacity: config.channel_capacity,
            tracker_capacity: config.tracker_capacity,
        }
    }
}

/// How a dialogue ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DialogueOutcome {
    /// An iteration signalled completion.
    Completed { iterations: u32 },
    /// The iteration budget ran out without a completion signal.
    Exhausted { iterations: u32 },
    /// The caller stopped consuming the stream during `iteration`.
    Abandoned { iteration: u32 },
}

impl DialogueOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Exhausted { .. } => "exhausted",
            Self::Abandoned { .. } => "abandoned",
        }
    }

    /// Iterations that ran, including an abandoned one.
    pub fn iterations(&self) -> u32 {
        match self {
            Self::Completed { iterations } | Self::Exhausted { iterations } => *iterations,
            Self::Abandoned { iteration } => *iteration,
        }
    }

    fn terminal_state(&self) -> DialogueState {
        match *self {
            Self::Completed { iterations } => DialogueState::Completed {
                iteration: iterations,
            },
            Self::Exhausted { iterations } => DialogueState::Exhausted { iterations },
            Self::Abandoned { iteration } => DialogueState::Abandoned { iteration },
        }
    }
}

impl std::fmt::Display for DialogueOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} after {} iteration(s)", self.as_str(), self.iterations())
    }
}

/// State shared between the orchestrator handle and its running loop.
///
/// `generation` changes on every run and every cleanup; a loop only writes
/// while the generation it started with is still current.
struct Shared {
    session: Mutex<DialogueSession>,
    tracker: Mutex<MessageTracker>,
    generation: AtomicU64,
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, DialogueSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tracker(&self) -> MutexGuard<'_, MessageTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

pub struct DialogueOrchestrator {
    pair: CapabilityPair,
    plan_store: Option<Arc<dyn PlanStore>>,
    settings: DialogueSettings,
    event_bus: Arc<EventBus>,
    shared: Arc<Shared>,
}

impl DialogueOrchestrator {
    /// Create an orchestrator over an Evaluator and a Planner/Executor.
    pub fn new(evaluator: Arc<dyn AgentCapability>, executor: Arc<dyn AgentCapability>) -> Self {
        let settings = DialogueSettings::default();
        Self {
            pair: CapabilityPair::new(evaluator, executor),
            plan_store: None,
            shared: Arc::new(Shared {
                session: Mutex::new(DialogueSession::default()),
                tracker: Mutex::new(MessageTracker::new(settings.tracker_capacity)),
                generation: AtomicU64::new(0),
            }),
            settings,
            event_bus: Arc::new(EventBus::default()),
        }
    }

    pub fn with_evaluator_config(mut self, config: CapabilityConfig) -> Self {
        self.pair.evaluator_config = config;
        self
    }

    pub fn with_executor_config(mut self, config: CapabilityConfig) -> Self {
        self.pair.executor_config = config;
        self
    }

    /// Persist the plan extracted from iteration 1.
    pub fn with_plan_store(mut self, store: Arc<dyn PlanStore>) -> Self {
        self.plan_store = Some(store);
        self
    }

    pub fn with_settings(mut self, settings: DialogueSettings) -> Self {
        *self.shared.tracker() = MessageTracker::new(settings.tracker_capacity);
        self.settings = settings;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn settings(&self) -> &DialogueSettings {
        &self.settings
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Start the dialogue for the task at `task_spec_path`.
    ///
    /// An unreadable or malformed specification is returned as an error
    /// before anything is streamed. An empty `original_request` falls back
    /// to the request in the specification.
    pub async fn run_dialogue(
        &self,
        task_spec_path: &Path,
        original_request: &str,
        session_id: &str,
    ) -> Result<DialogueStream, DialogueError> {
        let spec = TaskSpecification::load(task_spec_path).await?;
        let request = if original_request.trim().is_empty() {
            spec.original_request.clone()
        } else {
            original_request.to_string()
        };
        let max_iterations = self.settings.max_iterations.max(1);

        let generation = {
            let mut session = self.shared.session();
            if session.state.is_running() {
                return Err(DialogueError::AlreadyRunning {
                    session_id: session.session_id.clone(),
                });
            }
            *session = DialogueSession::new(&spec.task_id, session_id, &request, max_iterations);
            session.state = DialogueState::Running { iteration: 0 };
            self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        self.shared.tracker().reset();

        info!(
            session_id,
            task_id = %spec.task_id,
            max_iterations,
            "Starting dialogue"
        );

        let (tx, rx) = mpsc::channel(self.settings.channel_capacity.max(1));
        let run = DialogueRun {
            pair: self.pair.clone(),
            detector: CompletionDetector::new(&self.settings.completion_tool),
            plan_store: self.plan_store.clone(),
            event_bus: self.event_bus.clone(),
            shared: self.shared.clone(),
            generation,
            spec: Arc::new(spec),
            original_request: request,
            session_id: session_id.to_string(),
            max_iterations,
            tx,
        };
        let handle = tokio::spawn(run.run());

        Ok(DialogueStream::new(rx, handle))
    }

    /// Clear all per-session state and the message tracker.
    ///
    /// Idempotent. A loop still running from before the cleanup keeps
    /// going until its consumer is gone but no longer touches this state.
    pub fn cleanup(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        *self.shared.session() = DialogueSession::default();
        self.shared.tracker().reset();
        debug!("Dialogue state cleaned up");
    }

    /// Copy of the current session state.
    pub fn session_snapshot(&self) -> DialogueSession {
        self.shared.session().clone()
    }

    /// Messages forwarded in the current session.
    pub fn forwarded_messages(&self) -> u64 {
        self.shared.tracker().forwarded()
    }
}

/// Everything one spawned loop owns.
struct DialogueRun {
    pair: CapabilityPair,
    detector: CompletionDetector,
    plan_store: Option<Arc<dyn PlanStore>>,
    event_bus: Arc<EventBus>,
    shared: Arc<Shared>,
    generation: u64,
    spec: Arc<TaskSpecification>,
    original_request: String,
    session_id: String,
    max_iterations: u32,
    tx: mpsc::Sender<DialogueMessage>,
}

impl DialogueRun {
    async fn run(self) -> DialogueOutcome {
        self.event_bus.publish(DomainEvent::DialogueStarted {
            session_id: self.session_id.clone(),
            task_id: self.spec.task_id.clone(),
            max_iterations: self.max_iterations,
            timestamp: Utc::now(),
        });

        let mut previous_output: Option<String> = None;
        let mut plan_saved = false;
        let mut iteration = 0u32;

        let outcome = loop {
            iteration += 1;
            self.update_session(|s| {
                s.begin_iteration();
            });
            if self.shared.is_current(self.generation) {
                self.shared.tracker().enter_iteration(iteration);
            }

            let mut bridge = IterationBridge::new(
                self.pair.clone(),
                self.detector.clone(),
                self.spec.clone(),
                iteration,
                previous_output.take(),
                &self.session_id,
            );

            let mut first_iteration_text = String::new();
            let mut forwarded = 0usize;
            let mut abandoned = false;

            while let Some(message) = bridge.next_message().await {
                let Some(message) = self.track(message) else {
                    continue;
                };
                if iteration == 1 && message.is_text() {
                    first_iteration_text.push_str(&message.content);
                    first_iteration_text.push('\n');
                }
                if self.tx.send(message).await.is_err() {
                    abandoned = true;
                    break;
                }
                forwarded += 1;
            }

            if abandoned {
                info!(
                    session_id = %self.session_id,
                    iteration,
                    "Dialogue stream dropped by consumer"
                );
                break DialogueOutcome::Abandoned { iteration };
            }

            if iteration == 1 && !plan_saved {
                plan_saved = self.save_plan(&first_iteration_text).await;
            }

            let record = bridge.into_record();
            let completed = record.task_completed;
            self.update_session(|s| {
                s.finish_iteration(record.captured_execution_output.clone(), completed);
                s.plan_saved = plan_saved;
            });
            previous_output = Some(record.captured_execution_output);

            self.event_bus.publish(DomainEvent::IterationCompleted {
                session_id: self.session_id.clone(),
                iteration,
                task_completed: completed,
                messages_forwarded: forwarded,
                timestamp: Utc::now(),
            });
            debug!(
                session_id = %self.session_id,
                iteration,
                completed,
                forwarded,
                "Iteration finished"
            );

            if completed {
                info!(session_id = %self.session_id, iteration, "Task completed");
                break DialogueOutcome::Completed {
                    iterations: iteration,
                };
            }
            if iteration >= self.max_iterations {
                warn!(
                    session_id = %self.session_id,
                    iterations = iteration,
                    "Iteration budget exhausted without a completion signal"
                );
                break DialogueOutcome::Exhausted {
                    iterations: iteration,
                };
            }
        };

        self.update_session(|s| s.state = outcome.terminal_state());
        self.event_bus.publish(DomainEvent::DialogueFinished {
            session_id: self.session_id.clone(),
            outcome: outcome.as_str().to_string(),
            iterations: outcome.iterations(),
            timestamp: Utc::now(),
        });

        outcome
    }

    fn update_session(&self, f: impl FnOnce(&mut DialogueSession)) {
        if self.shared.is_current(self.generation) {
            f(&mut self.shared.session());
        }
    }

    /// Pass the message through the tracker; `None` for a duplicate.
    fn track(&self, message: DialogueMessage) -> Option<DialogueMessage> {
        if !self.shared.is_current(self.generation) {
            return Some(message);
        }
        let tracked = self.shared.tracker().track(message);
        if tracked.is_none() {
            debug!(session_id = %self.session_id, "Duplicate message suppressed");
        }
        tracked
    }

    /// One best-effort plan extraction and save. Never fails the loop.
    async fn save_plan(&self, text: &str) -> bool {
        let Some(store) = &self.plan_store else {
            return false;
        };
        let Some(plan) = extract_plan(text, &self.original_request, &self.spec.task_id) else {
            debug!(session_id = %self.session_id, "No plan found in first iteration output");
            return false;
        };

        let total_steps = plan.total_steps;
        match store.save(plan).await {
            Ok(()) => {
                info!(
                    session_id = %self.session_id,
                    task_id = %self.spec.task_id,
                    store = store.name(),
                    total_steps,
                    "Plan saved"
                );
                self.event_bus.publish(DomainEvent::PlanSaved {
                    session_id: self.session_id.clone(),
                    task_id: self.spec.task_id.clone(),
                    total_steps,
                    timestamp: Utc::now(),
                });
                true
            }
            Err(e) => {
                warn!(
                    session_id = %self.session_id,
                    task_id = %self.spec.task_id,
                    error = %e,
                    "Failed to save plan"
                );
                self.event_bus.publish(DomainEvent::PlanSaveFailed {
                    session_id: self.session_id.clone(),
                    task_id: self.spec.task_id.clone(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingPlanStore, ScriptStep, ScriptedCapability};
    use disclaude_store::InMemoryPlanStore;
    use serde_json::json;
    use std::path::PathBuf;

    const PLAN_REPLY: &str = "Here is the plan.\n\n```json\n\
        {\"title\": \"Hello file\", \"subtasks\": [{\"title\": \"Write hello.txt\"}]}\n\
        ```\n\nExecutor: create hello.txt.";

    fn write_spec(dir: &tempfile::TempDir, request: &str) -> PathBuf {
        let path = dir.path().join("om_1.md");
        std::fs::write(&path, TaskSpecification::new("om_1", request).render()).unwrap();
        path
    }

    fn settings(max_iterations: u32) -> DialogueSettings {
        DialogueSettings {
            max_iterations,
            ..DialogueSettings::default()
        }
    }

    #[tokio::test]
    async fn completes_on_first_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let spec = write_spec(&dir, "write hello.txt");
        let evaluator = Arc::new(ScriptedCapability::new("eval").otherwise(vec![
            ScriptStep::text(PLAN_REPLY),
            ScriptStep::tool("task_done", json!({"summary": "hello.txt exists"})),
        ]));
        let executor = Arc::new(ScriptedCapability::new("exec"));
        let store = InMemoryPlanStore::new();

        let orchestrator = DialogueOrchestrator::new(evaluator.clone(), executor.clone())
            .with_plan_store(Arc::new(store.clone()))
            .with_settings(settings(5));

        let stream = orchestrator
            .run_dialogue(&spec, "write hello.txt", "sess-1")
            .await
            .unwrap();
        let (messages, outcome) = stream.drain().await.unwrap();

        assert_eq!(outcome, DialogueOutcome::Completed { iterations: 1 });
        assert_eq!(messages.len(), 2);
        assert_eq!(evaluator.invocations(), 1);
        assert_eq!(executor.invocations(), 0);
        assert_eq!(store.count().await, 1);
        assert_eq!(store.saved().await[0].title, "Hello file");

        let session = orchestrator.session_snapshot();
        assert_eq!(session.current_iteration, 1);
        assert_eq!(session.previous_execution_output.as_deref(), Some(""));
        assert!(session.plan_saved);
        assert!(session.done);
        assert_eq!(session.state, DialogueState::Completed { iteration: 1 });
    }

    #[tokio::test]
    async fn exhausts_budget_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let spec = write_spec(&dir, "never done");
        let evaluator = Arc::new(
            ScriptedCapability::new("eval")
                .then(vec![ScriptStep::text("eval 1")])
                .then(vec![ScriptStep::text("eval 2")])
                .then(vec![ScriptStep::text("eval 3")]),
        );
        let executor = Arc::new(
            ScriptedCapability::new("exec")
                .then(vec![ScriptStep::text("exec 1")])
                .then(vec![ScriptStep::text("exec 2")])
                .then(vec![ScriptStep::text("exec 3")]),
        );

        let orchestrator =
            DialogueOrchestrator::new(evaluator, executor).with_settings(settings(3));
        let (messages, outcome) = orchestrator
            .run_dialogue(&spec, "", "sess-1")
            .await
            .unwrap()
            .drain()
            .await
            .unwrap();

        assert_eq!(outcome, DialogueOutcome::Exhausted { iterations: 3 });
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["eval 1", "exec 1", "eval 2", "exec 2", "eval 3", "exec 3"]
        );
        let sequences: Vec<_> = messages.iter().map(|m| m.sequence.unwrap()).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4, 5, 6]);

        let session = orchestrator.session_snapshot();
        assert_eq!(session.current_iteration, 3);
        assert_eq!(session.original_request, "never done");
        assert!(!session.done);
    }

    #[tokio::test]
    async fn executor_failure_does_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        let spec = write_spec(&dir, "flaky");
        let evaluator = Arc::new(
            ScriptedCapability::new("eval")
                .then(vec![ScriptStep::text("go")])
                .then(vec![ScriptStep::text("go again")])
                .then(vec![ScriptStep::tool("task_done", json!({}))]),
        );
        let executor = Arc::new(
            ScriptedCapability::new("exec")
                .then(vec![ScriptStep::text("step one")])
                .then(vec![ScriptStep::fail("connection reset")]),
        );
        let bus = Arc::new(EventBus::default());
        let mut events = bus.subscribe();

        let orchestrator = DialogueOrchestrator::new(evaluator.clone(), executor)
            .with_settings(settings(5))
            .with_event_bus(bus);
        let (messages, outcome) = orchestrator
            .run_dialogue(&spec, "flaky", "sess-1")
            .await
            .unwrap()
            .drain()
            .await
            .unwrap();

        assert_eq!(outcome, DialogueOutcome::Completed { iterations: 3 });
        let errors: Vec<_> = messages
            .iter()
            .filter(|m| m.message_type() == "error")
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].content.contains("connection reset"));

        let mut iteration_two_completed = None;
        while let Ok(event) = events.try_recv() {
            if let DomainEvent::IterationCompleted {
                iteration: 2,
                task_completed,
                ..
            } = &*event
            {
                iteration_two_completed = Some(*task_completed);
            }
        }
        assert_eq!(iteration_two_completed, Some(false));

        // Iteration 3 evaluates the (empty) output of the failed iteration 2.
        let prompts = evaluator.prompts();
        assert!(prompts[2].contains("## Output of iteration 2"));
        assert!(!prompts[2].contains("step one"));
    }

    #[tokio::test]
    async fn evaluation_sees_only_the_previous_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let spec = write_spec(&dir, "three steps");
        let evaluator = Arc::new(ScriptedCapability::new("eval"));
        let executor = Arc::new(
            ScriptedCapability::new("exec")
                .then(vec![ScriptStep::text("output-alpha")])
                .then(vec![ScriptStep::text("output-beta")])
                .then(vec![ScriptStep::text("output-gamma")]),
        );

        let orchestrator =
            DialogueOrchestrator::new(evaluator.clone(), executor).with_settings(settings(3));
        orchestrator
            .run_dialogue(&spec, "", "sess-1")
            .await
            .unwrap()
            .drain()
            .await
            .unwrap();

        let prompts = evaluator.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(!prompts[0].contains("output-"));
        assert!(prompts[1].contains("output-alpha"));
        assert!(prompts[2].contains("output-beta"));
        assert!(!prompts[2].contains("output-alpha"));
    }

    #[tokio::test]
    async fn plan_save_is_attempted_at_most_once() {
        let dir = tempfile::tempdir().unwrap();
        let spec = write_spec(&dir, "plan me");
        let evaluator =
            Arc::new(ScriptedCapability::new("eval").otherwise(vec![ScriptStep::text(PLAN_REPLY)]));
        let executor = Arc::new(ScriptedCapability::new("exec"));
        let store = Arc::new(FailingPlanStore::default());
        let bus = Arc::new(EventBus::default());
        let mut events = bus.subscribe();

        let orchestrator = DialogueOrchestrator::new(evaluator, executor)
            .with_plan_store(store.clone())
            .with_settings(settings(4))
            .with_event_bus(bus);
        let (messages, outcome) = orchestrator
            .run_dialogue(&spec, "", "sess-1")
            .await
            .unwrap()
            .drain()
            .await
            .unwrap();

        assert_eq!(outcome, DialogueOutcome::Exhausted { iterations: 4 });
        assert_eq!(store.attempts(), 1);
        assert!(!orchestrator.session_snapshot().plan_saved);
        // Persistence failures are never surfaced in the stream.
        assert!(messages.iter().all(|m| m.message_type() != "error"));

        let mut failures = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(&*event, DomainEvent::PlanSaveFailed { .. }) {
                failures += 1;
            }
        }
        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn duplicates_within_an_iteration_are_suppressed() {
        let dir = tempfile::tempdir().unwrap();
        let spec = write_spec(&dir, "dupes");
        let evaluator = Arc::new(ScriptedCapability::new("eval").otherwise(vec![
            ScriptStep::text("Checking"),
            ScriptStep::text("Checking"),
            ScriptStep::completion("Done"),
        ]));
        let executor = Arc::new(ScriptedCapability::new("exec"));

        let orchestrator = DialogueOrchestrator::new(evaluator, executor);
        let (messages, _) = orchestrator
            .run_dialogue(&spec, "", "sess-1")
            .await
            .unwrap()
            .drain()
            .await
            .unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(orchestrator.forwarded_messages(), 2);
    }

    #[tokio::test]
    async fn unreadable_spec_is_rejected_before_streaming() {
        let evaluator = Arc::new(ScriptedCapability::new("eval"));
        let orchestrator = DialogueOrchestrator::new(evaluator.clone(), evaluator.clone());

        let result = orchestrator
            .run_dialogue(Path::new("/definitely/not/here.md"), "x", "sess-1")
            .await;

        assert!(matches!(result, Err(DialogueError::TaskSpec(_))));
        assert_eq!(evaluator.invocations(), 0);
        assert_eq!(orchestrator.session_snapshot(), DialogueSession::default());
    }

    #[tokio::test]
    async fn second_run_while_running_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let spec = write_spec(&dir, "busy");
        let evaluator = Arc::new(ScriptedCapability::new("eval").otherwise(vec![
            ScriptStep::text("a"),
            ScriptStep::text("b"),
            ScriptStep::text("c"),
        ]));
        let executor = Arc::new(ScriptedCapability::new("exec"));
        let orchestrator = DialogueOrchestrator::new(evaluator, executor).with_settings(
            DialogueSettings {
                channel_capacity: 1,
                ..settings(2)
            },
        );

        let first = orchestrator.run_dialogue(&spec, "", "sess-1").await.unwrap();
        let second = orchestrator.run_dialogue(&spec, "", "sess-2").await;
        assert!(matches!(
            second,
            Err(DialogueError::AlreadyRunning { session_id }) if session_id == "sess-1"
        ));

        let (_, outcome) = first.drain().await.unwrap();
        assert_eq!(outcome, DialogueOutcome::Exhausted { iterations: 2 });
    }

    #[tokio::test]
    async fn dropped_stream_abandons_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let spec = write_spec(&dir, "abandon");
        let evaluator = Arc::new(
            ScriptedCapability::new("eval")
                .otherwise(vec![ScriptStep::text("one"), ScriptStep::text("two")]),
        );
        let executor = Arc::new(ScriptedCapability::new("exec"));
        let orchestrator = DialogueOrchestrator::new(evaluator, executor).with_settings(
            DialogueSettings {
                channel_capacity: 1,
                ..settings(10)
            },
        );

        let mut stream = orchestrator.run_dialogue(&spec, "", "sess-1").await.unwrap();
        assert_eq!(stream.recv().await.unwrap().content, "one");
        let outcome = stream.finish().await.unwrap();

        assert!(matches!(outcome, DialogueOutcome::Abandoned { .. }));
        assert!(outcome.iterations() <= 10);
    }

    #[tokio::test]
    async fn cleanup_twice_equals_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let spec = write_spec(&dir, "reuse");
        let evaluator = Arc::new(
            ScriptedCapability::new("eval").otherwise(vec![ScriptStep::completion("done")]),
        );
        let executor = Arc::new(ScriptedCapability::new("exec"));
        let orchestrator = DialogueOrchestrator::new(evaluator, executor);

        orchestrator
            .run_dialogue(&spec, "", "sess-1")
            .await
            .unwrap()
            .drain()
            .await
            .unwrap();
        assert_ne!(orchestrator.session_snapshot(), DialogueSession::default());

        orchestrator.cleanup();
        orchestrator.cleanup();
        assert_eq!(orchestrator.session_snapshot(), DialogueSession::default());
        assert_eq!(orchestrator.forwarded_messages(), 0);

        // Reusable for an unrelated session; identical messages are new again.
        let (messages, outcome) = orchestrator
            .run_dialogue(&spec, "", "sess-2")
            .await
            .unwrap()
            .drain()
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sequence, Some(1));
        assert_eq!(outcome, DialogueOutcome::Completed { iterations: 1 });
        assert_eq!(orchestrator.session_snapshot().session_id, "sess-2");
    }

    #[test]
    fn settings_from_config() {
        let config = DialogueConfig {
            max_iterations: 7,
            ..DialogueConfig::default()
        };
        let settings = DialogueSettings::from(&config);
        assert_eq!(settings.max_iterations, 7);
        assert_eq!(settings.completion_tool, "task_done");
    }

    #[test]
    fn outcome_display() {
        assert_eq!(
            DialogueOutcome::Exhausted { iterations: 3 }.to_string(),
            "exhausted after 3 iteration(s)"
        );
    }
}
