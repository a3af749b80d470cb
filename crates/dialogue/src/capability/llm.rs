//! An agent capability backed by an LLM provider and a tool registry.
//!
//! Each invocation runs a bounded tool-calling loop in a spawned task and
//! streams what happens:
//!
//! - a `text` message per non-empty model reply
//! - a `tool_use` message per tool call, then a `text` message carrying
//!   the tool result (metadata `tool_result`, `success`)
//! - a `task_completion` message when a reply contains the configured
//!   completion marker
//!
//! Provider failures end the stream with an `Err` item.

use std::sync::Arc;

use async_trait::async_trait;
use disclaude_core::{
    AgentCapability, CapabilityConfig, CapabilityError, CapabilityStream, DialogueMessage,
    Message, Provider, ProviderRequest, ToolCall, ToolRegistry, ToolResult,
};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub struct LlmCapability {
    name: String,
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    channel_capacity: usize,
}

impl LlmCapability {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: format!("llm:{}", provider.name()),
            provider,
            tools,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            channel_capacity: 32,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

/// What one spawned invocation owns.
struct Turns {
    capability: String,
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    config: CapabilityConfig,
    tx: mpsc::Sender<Result<DialogueMessage, CapabilityError>>,
}

impl Turns {
    async fn run(self, prompt: String) {
        let definitions = self
            .tools
            .definitions_where(|name| self.config.allows_tool(name));

        let mut messages = Vec::new();
        if !self.config.system_prompt.is_empty() {
            messages.push(Message::system(&self.config.system_prompt));
        }
        messages.push(Message::user(prompt));

        for turn in 1..=self.config.max_turns.max(1) {
            let request = ProviderRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: definitions.clone(),
            };

            let response = match self.provider.complete(request).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(capability = %self.capability, turn, error = %e, "Provider call failed");
                    let _ = self.tx.send(Err(CapabilityError::from(e))).await;
                    return;
                }
            };

            let reply = response.message;
            let content = reply.content.trim().to_string();
            if !content.is_empty() {
                if !self.emit(DialogueMessage::text(&content)).await {
                    return;
                }
                if let Some(marker) = &self.config.completion_marker
                    && signals_marker(&content, marker)
                    && !self.emit(DialogueMessage::task_completion(marker.as_str())).await
                {
                    return;
                }
            }

            if reply.tool_calls.is_empty() {
                debug!(capability = %self.capability, turn, "Reply without tool calls, done");
                return;
            }

            let calls = reply.tool_calls.clone();
            messages.push(reply);

            for call in calls {
                let arguments = serde_json::from_str(&call.arguments).unwrap_or_else(|_| json!({}));
                if !self
                    .emit(DialogueMessage::tool_use(&call.name, arguments.clone()))
                    .await
                {
                    return;
                }

                let result = self
                    .execute(ToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments,
                    })
                    .await;

                let report = DialogueMessage::text(&result.output)
                    .with_metadata("tool_result", json!(call.name))
                    .with_metadata("success", json!(result.success));
                if !self.emit(report).await {
                    return;
                }
                messages.push(Message::tool_result(&call.id, &result.output));
            }
        }

        debug!(
            capability = %self.capability,
            max_turns = self.config.max_turns,
            "Turn budget reached"
        );
    }

    async fn execute(&self, call: ToolCall) -> ToolResult {
        if !self.config.allows_tool(&call.name) {
            warn!(capability = %self.capability, tool = %call.name, "Tool not permitted");
            return ToolResult {
                call_id: call.id,
                ..ToolResult::failed(format!("Tool '{}' is not permitted here", call.name))
            };
        }
        match self.tools.execute(&call).await {
            Ok(result) => result,
            Err(e) => ToolResult {
                call_id: call.id,
                ..ToolResult::failed(e.to_string())
            },
        }
    }

    /// `false` once the consumer is gone.
    async fn emit(&self, message: DialogueMessage) -> bool {
        self.tx.send(Ok(message)).await.is_ok()
    }
}

/// The marker counts only as a line of its own or as the reply's final
/// token, so a reply that merely mentions it does not complete the task.
fn signals_marker(content: &str, marker: &str) -> bool {
    let marker = marker.trim();
    if marker.is_empty() {
        return false;
    }
    if content.lines().any(|line| line.trim() == marker) {
        return true;
    }
    content
        .split_whitespace()
        .next_back()
        .map(|token| token.trim_end_matches(['.', '!']))
        .is_some_and(|token| token == marker)
}

#[async_trait]
impl AgentCapability for LlmCapability {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        prompt: String,
        config: &CapabilityConfig,
    ) -> Result<CapabilityStream, CapabilityError> {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let turns = Turns {
            capability: self.name.clone(),
            provider: self.provider.clone(),
            tools: self.tools.clone(),
            model: config.model.clone().unwrap_or_else(|| self.model.clone()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            config: config.clone(),
            tx,
        };
        tokio::spawn(turns.run(prompt));
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        SequentialMockProvider, make_text_response, make_tool_call, make_tool_call_response,
    };
    use disclaude_core::{ProviderError, ProviderResponse, Tool, ToolError};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok(
                arguments["text"].as_str().unwrap_or_default().to_string(),
            ))
        }
    }

    struct DownProvider;

    #[async_trait]
    impl Provider for DownProvider {
        fn name(&self) -> &str {
            "down"
        }
        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        Arc::new(registry)
    }

    async fn collect(mut rx: CapabilityStream) -> Vec<Result<DialogueMessage, CapabilityError>> {
        let mut out = Vec::new();
        while let Some(item) = rx.recv().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn plain_reply_is_one_text_message() {
        let provider = Arc::new(SequentialMockProvider::new(vec![make_text_response("Hello")]));
        let capability = LlmCapability::new(provider.clone(), registry(), "glm-4.7");

        let rx = capability
            .invoke("hi".into(), &CapabilityConfig::executor())
            .await
            .unwrap();
        let items = collect(rx).await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().content, "Hello");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn tool_call_then_answer() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response(vec![make_tool_call("echo", json!({"text": "pong"}))], ""),
            make_text_response("Echoed pong"),
        ]));
        let capability = LlmCapability::new(provider.clone(), registry(), "glm-4.7");
        let config = CapabilityConfig::executor().with_system_prompt("Be brief");

        let items = collect(capability.invoke("ping".into(), &config).await.unwrap()).await;
        let messages: Vec<_> = items.into_iter().map(Result::unwrap).collect();

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].tool_name(), Some("echo"));
        assert_eq!(messages[1].content, "pong");
        assert_eq!(messages[1].metadata["tool_result"], "echo");
        assert_eq!(messages[1].metadata["success"], true);
        assert_eq!(messages[2].content, "Echoed pong");

        let requests = provider.requests();
        assert_eq!(requests[0].tools.len(), 1);
        // system + user + assistant(tool call) + tool result
        assert_eq!(requests[1].messages.len(), 4);
    }

    #[tokio::test]
    async fn disallowed_tools_are_hidden_and_refused() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response(vec![make_tool_call("echo", json!({"text": "x"}))], ""),
            make_text_response("ok"),
        ]));
        let capability = LlmCapability::new(provider.clone(), registry(), "glm-4.7");
        let config = CapabilityConfig::evaluator().with_allowed_tools(vec!["task_done".into()]);

        let items = collect(capability.invoke("go".into(), &config).await.unwrap()).await;
        let report = items[1].as_ref().unwrap();

        assert_eq!(report.metadata["success"], false);
        assert!(report.content.contains("not permitted"));
        assert!(provider.requests()[0].tools.is_empty());
    }

    #[tokio::test]
    async fn completion_marker_emits_completion() {
        let provider = Arc::new(SequentialMockProvider::new(vec![make_text_response(
            "All files written. TASK_COMPLETE",
        )]));
        let capability = LlmCapability::new(provider, registry(), "glm-4.7");
        let config = CapabilityConfig::evaluator().with_completion_marker("TASK_COMPLETE");

        let items = collect(capability.invoke("check".into(), &config).await.unwrap()).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_ref().unwrap().message_type(), "task_completion");
    }

    #[tokio::test]
    async fn mentioned_marker_is_not_completion() {
        let provider = Arc::new(SequentialMockProvider::new(vec![make_text_response(
            "Two files remain, so this is not TASK_COMPLETE yet.",
        )]));
        let capability = LlmCapability::new(provider, registry(), "glm-4.7");
        let config = CapabilityConfig::evaluator().with_completion_marker("TASK_COMPLETE");

        let items = collect(capability.invoke("check".into(), &config).await.unwrap()).await;
        let kinds: Vec<_> = items
            .iter()
            .map(|i| i.as_ref().unwrap().message_type())
            .collect();
        assert_eq!(kinds, vec!["text"]);
    }

    #[test]
    fn marker_matches_own_line_or_last_token() {
        assert!(signals_marker("All done.\nTASK_COMPLETE\n", "TASK_COMPLETE"));
        assert!(signals_marker("Everything is written. TASK_COMPLETE.", "TASK_COMPLETE"));
        assert!(!signals_marker("TASK_COMPLETE is what I'll say later", "TASK_COMPLETE"));
        assert!(!signals_marker("not TASK_COMPLETE_YET", "TASK_COMPLETE"));
        assert!(!signals_marker("anything", "  "));
    }

    #[tokio::test]
    async fn turn_budget_is_respected() {
        let call = || make_tool_call_response(vec![make_tool_call("echo", json!({"text": "again"}))], "");
        let provider = Arc::new(SequentialMockProvider::new(vec![call(), call(), call()]));
        let capability = LlmCapability::new(provider.clone(), registry(), "glm-4.7");
        let config = CapabilityConfig::executor().with_max_turns(2);

        collect(capability.invoke("loop".into(), &config).await.unwrap()).await;
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn provider_error_is_a_stream_error() {
        let capability = LlmCapability::new(Arc::new(DownProvider), registry(), "glm-4.7");

        let items = collect(
            capability
                .invoke("hi".into(), &CapabilityConfig::executor())
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(items.len(), 1);
        let err = items[0].as_ref().unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(capability.name(), "llm:down");
    }
}
