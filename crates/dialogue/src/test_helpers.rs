//! Shared test helpers: scripted capabilities and a sequential mock provider.
//!
//! Compiled for this crate's tests and, with the `test-util` feature, for
//! other crates' tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use disclaude_core::error::{CapabilityError, PlanStoreError, ProviderError};
use disclaude_core::message::{Message, MessageToolCall};
use disclaude_core::plan::{PlanStore, TaskPlan};
use disclaude_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use disclaude_core::{AgentCapability, CapabilityConfig, CapabilityStream, DialogueMessage};
use tokio::sync::mpsc;

/// One item a scripted capability emits.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Message(DialogueMessage),
    /// A mid-stream failure.
    Fail(String),
}

impl ScriptStep {
    pub fn text(content: &str) -> Self {
        Self::Message(DialogueMessage::text(content))
    }

    pub fn tool(name: &str, input: serde_json::Value) -> Self {
        Self::Message(DialogueMessage::tool_use(name, input))
    }

    pub fn completion(content: &str) -> Self {
        Self::Message(DialogueMessage::task_completion(content))
    }

    pub fn fail(reason: &str) -> Self {
        Self::Fail(reason.to_string())
    }
}

#[derive(Debug, Clone)]
enum Script {
    Steps(Vec<ScriptStep>),
    FailInvoke(String),
}

/// A capability that replays one script per invocation.
///
/// Queued scripts (`then`, `then_fail_invoke`) are consumed in order; once
/// they run out, every invocation replays the `otherwise` script (empty by
/// default).
pub struct ScriptedCapability {
    name: String,
    queue: Mutex<VecDeque<Script>>,
    fallback: Vec<ScriptStep>,
    prompts: Mutex<Vec<String>>,
    configs: Mutex<Vec<CapabilityConfig>>,
}

impl ScriptedCapability {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            queue: Mutex::new(VecDeque::new()),
            fallback: Vec::new(),
            prompts: Mutex::new(Vec::new()),
            configs: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, steps: Vec<ScriptStep>) -> Self {
        self.queue.lock().unwrap().push_back(Script::Steps(steps));
        self
    }

    pub fn then_fail_invoke(self, reason: &str) -> Self {
        self.queue
            .lock()
            .unwrap()
            .push_back(Script::FailInvoke(reason.to_string()));
        self
    }

    pub fn otherwise(mut self, steps: Vec<ScriptStep>) -> Self {
        self.fallback = steps;
        self
    }

    pub fn invocations(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn configs(&self) -> Vec<CapabilityConfig> {
        self.configs.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentCapability for ScriptedCapability {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        prompt: String,
        config: &CapabilityConfig,
    ) -> Result<CapabilityStream, CapabilityError> {
        self.prompts.lock().unwrap().push(prompt);
        self.configs.lock().unwrap().push(config.clone());

        let script = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::Steps(self.fallback.clone()));

        let steps = match script {
            Script::Steps(steps) => steps,
            Script::FailInvoke(reason) => {
                return Err(CapabilityError::InvokeFailed {
                    capability: self.name.clone(),
                    reason,
                });
            }
        };

        let (tx, rx) = mpsc::channel(steps.len().max(1));
        for step in steps {
            let item = match step {
                ScriptStep::Message(message) => Ok(message),
                ScriptStep::Fail(reason) => Err(CapabilityError::StreamFailed {
                    capability: self.name.clone(),
                    reason,
                }),
            };
            tx.try_send(item).unwrap();
        }
        Ok(rx)
    }
}

/// A plan store that always fails.
#[derive(Debug, Default)]
pub struct FailingPlanStore {
    attempts: Mutex<usize>,
}

impl FailingPlanStore {
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl PlanStore for FailingPlanStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn save(&self, _plan: TaskPlan) -> Result<(), PlanStoreError> {
        *self.attempts.lock().unwrap() += 1;
        Err(PlanStoreError::Storage("disk unavailable".into()))
    }
}

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue.
/// Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request seen so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let count = requests.len();

        if count >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                count,
                responses.len()
            );
        }

        requests.push(request);
        Ok(responses[count].clone())
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    let mut message = Message::assistant(thought);
    message.tool_calls = tool_calls;
    ProviderResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{}", name),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}
