//! Iteration Bridge: runs exactly one Evaluator + Planner/Executor cycle.
//!
//! The bridge is a pull-based sequence. Each call to
//! [`IterationBridge::next_message`] suspends on the active capability
//! stream and hands back the next message as soon as it is produced.
//! Capabilities are started lazily: the executor is invoked only after the
//! evaluator stream is exhausted, and not at all when the evaluator already
//! signalled completion.
//!
//! A failure to start a capability, or an error item in its stream, is
//! converted into one error-tagged message and ends the iteration as
//! incomplete.

use std::sync::Arc;

use disclaude_core::{
    AgentCapability, CapabilityConfig, CapabilityError, CapabilityRole, CapabilityStream,
    DialogueMessage, TaskSpecification,
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::completion::{CompletionDetector, CompletionSignal};
use crate::prompts::{build_evaluation_prompt, build_execution_prompt};

/// The two capabilities of an iteration and their role configurations.
#[derive(Clone)]
pub struct CapabilityPair {
    pub evaluator: Arc<dyn AgentCapability>,
    pub evaluator_config: CapabilityConfig,
    pub executor: Arc<dyn AgentCapability>,
    pub executor_config: CapabilityConfig,
}

impl CapabilityPair {
    pub fn new(evaluator: Arc<dyn AgentCapability>, executor: Arc<dyn AgentCapability>) -> Self {
        Self {
            evaluator,
            evaluator_config: CapabilityConfig::evaluator(),
            executor,
            executor_config: CapabilityConfig::executor(),
        }
    }

    fn for_role(&self, role: CapabilityRole) -> (&Arc<dyn AgentCapability>, &CapabilityConfig) {
        match role {
            CapabilityRole::Evaluator => (&self.evaluator, &self.evaluator_config),
            CapabilityRole::Executor => (&self.executor, &self.executor_config),
        }
    }
}

/// What one iteration hands to the orchestrator once its stream is drained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IterationRecord {
    pub iteration_number: u32,
    pub task_completed: bool,
    pub captured_execution_output: String,
}

/// Next capability to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Evaluate,
    Execute,
    Done,
}

pub struct IterationBridge {
    pair: CapabilityPair,
    detector: CompletionDetector,
    spec: Arc<TaskSpecification>,
    iteration: u32,
    previous_output: Option<String>,
    session_id: String,
    phase: Phase,
    active: Option<(CapabilityRole, CapabilityStream)>,
    guidance: Vec<String>,
    captured: Vec<String>,
    signals: Vec<CompletionSignal>,
    failed: bool,
}

impl IterationBridge {
    pub fn new(
        pair: CapabilityPair,
        detector: CompletionDetector,
        spec: Arc<TaskSpecification>,
        iteration: u32,
        previous_output: Option<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            pair,
            detector,
            spec,
            iteration,
            previous_output,
            session_id: session_id.into(),
            phase: Phase::Evaluate,
            active: None,
            guidance: Vec::new(),
            captured: Vec::new(),
            signals: Vec::new(),
            failed: false,
        }
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// The next message of this iteration, or `None` once both capabilities
    /// are exhausted (or the iteration failed).
    pub async fn next_message(&mut self) -> Option<DialogueMessage> {
        loop {
            if let Some((role, stream)) = &mut self.active {
                let role = *role;
                let next = stream.recv().await;
                match next {
                    Some(Ok(message)) => {
                        let message =
                            message.with_metadata("role", json!(role.to_string()));
                        self.observe(role, &message);
                        return Some(message);
                    }
                    Some(Err(e)) => {
                        self.active = None;
                        return Some(self.fail(role, e));
                    }
                    None => {
                        debug!(iteration = self.iteration, role = %role, "Capability stream ended");
                        self.active = None;
                        continue;
                    }
                }
            }

            match self.phase {
                Phase::Evaluate => {
                    self.phase = Phase::Execute;
                    let prompt = build_evaluation_prompt(
                        &self.spec,
                        self.iteration,
                        self.previous_output.as_deref(),
                        self.detector.tool_name(),
                    );
                    if let Err(e) = self.start(CapabilityRole::Evaluator, prompt).await {
                        return Some(self.fail(CapabilityRole::Evaluator, e));
                    }
                }
                Phase::Execute => {
                    self.phase = Phase::Done;
                    if !self.signals.is_empty() {
                        debug!(
                            iteration = self.iteration,
                            "Evaluator signalled completion, skipping executor"
                        );
                        continue;
                    }
                    let prompt = build_execution_prompt(
                        &self.spec,
                        self.iteration,
                        &self.guidance.join("\n"),
                    );
                    if let Err(e) = self.start(CapabilityRole::Executor, prompt).await {
                        return Some(self.fail(CapabilityRole::Executor, e));
                    }
                }
                Phase::Done => return None,
            }
        }
    }

    async fn start(&mut self, role: CapabilityRole, prompt: String) -> Result<(), CapabilityError> {
        let (capability, config) = self.pair.for_role(role);
        let config = config.for_iteration(&self.session_id, self.iteration);
        info!(
            session_id = %self.session_id,
            iteration = self.iteration,
            role = %role,
            capability = capability.name(),
            "Invoking capability"
        );
        let stream = capability.invoke(prompt, &config).await?;
        self.active = Some((role, stream));
        Ok(())
    }

    fn observe(&mut self, role: CapabilityRole, message: &DialogueMessage) {
        if let Some(signal) = self.detector.detect(message) {
            info!(iteration = self.iteration, role = %role, ?signal, "Completion signal");
            self.signals.push(signal);
        }

        let content = message.content.trim();
        if content.is_empty() {
            return;
        }
        match role {
            CapabilityRole::Evaluator => {
                if message.is_text() {
                    self.guidance.push(content.to_string());
                }
            }
            CapabilityRole::Executor => self.captured.push(content.to_string()),
        }
    }

    fn fail(&mut self, role: CapabilityRole, error: CapabilityError) -> DialogueMessage {
        warn!(
            session_id = %self.session_id,
            iteration = self.iteration,
            role = %role,
            error = %error,
            "Capability failed, ending iteration"
        );
        self.failed = true;
        self.phase = Phase::Done;
        DialogueMessage::error(error.to_string()).with_metadata("role", json!(role.to_string()))
    }

    /// Whether a completion signal was observed. Meaningful once
    /// [`Self::next_message`] has returned `None`.
    pub fn is_complete(&self) -> bool {
        !self.failed && !self.signals.is_empty()
    }

    /// Every completion signal observed, in arrival order.
    pub fn signals(&self) -> &[CompletionSignal] {
        &self.signals
    }

    /// Non-empty executor message contents joined with newlines.
    pub fn captured_output(&self) -> String {
        self.captured.join("\n")
    }

    pub fn into_record(self) -> IterationRecord {
        IterationRecord {
            iteration_number: self.iteration,
            task_completed: self.is_complete(),
            captured_execution_output: self.captured_output(),
        }
    }
}
