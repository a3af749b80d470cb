//! Planner/Executor wrapper that decomposes work into ordered subtasks.
//!
//! The inner capability is first asked, without tools, for a numbered list
//! of subtasks. Each subtask then gets its own fresh inner invocation. The
//! caller still sees one flat, ordered stream: the decomposition reply, then
//! per subtask an announcement followed by that subtask's messages.
//!
//! Fewer than `min_subtasks` items means the work is not worth splitting
//! and the original prompt is run directly instead.

use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use disclaude_core::{
    AgentCapability, CapabilityConfig, CapabilityError, CapabilityStream, DialogueMessage,
};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::plan_extractor::numbered_item;

const DECOMPOSE_SYSTEM_PROMPT: &str = "\
You split work into steps. Reply with a numbered list of ordered subtasks, \
one per line (\"1. ...\"), and nothing else. A small job is a single item.";

type Sender = mpsc::Sender<Result<DialogueMessage, CapabilityError>>;

pub struct SubtaskCapability {
    inner: Arc<dyn AgentCapability>,
    name: String,
    min_subtasks: usize,
    channel_capacity: usize,
}

impl SubtaskCapability {
    pub fn new(inner: Arc<dyn AgentCapability>) -> Self {
        Self {
            name: format!("subtasks:{}", inner.name()),
            inner,
            min_subtasks: 2,
            channel_capacity: 32,
        }
    }

    pub fn with_min_subtasks(mut self, min: usize) -> Self {
        self.min_subtasks = min.max(1);
        self
    }
}

/// Parse the numbered items of a decomposition reply.
pub fn parse_subtasks(text: &str) -> Vec<String> {
    text.lines().filter_map(numbered_item).collect()
}

fn subtask_prompt(prompt: &str, subtask: &str, index: usize, total: usize, done: &[String]) -> String {
    let mut out = format!("{prompt}\n\n## Current subtask ({index}/{total})\n\n{subtask}\n");
    if !done.is_empty() {
        out.push_str("\n## Already completed\n\n");
        for (i, title) in done.iter().enumerate() {
            let _ = writeln!(out, "{}. {title}", i + 1);
        }
    }
    out.push_str("\nWork on the current subtask only.\n");
    out
}

/// Forward every item of one inner invocation. `false` if the run must stop
/// (the invocation failed or the consumer is gone).
async fn forward(
    inner: &Arc<dyn AgentCapability>,
    prompt: String,
    config: &CapabilityConfig,
    tx: &Sender,
    mut collect: Option<&mut String>,
) -> bool {
    let mut stream = match inner.invoke(prompt, config).await {
        Ok(stream) => stream,
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            return false;
        }
    };

    while let Some(item) = stream.recv().await {
        let failed = item.is_err();
        if let (Ok(message), Some(text)) = (&item, collect.as_mut())
            && message.is_text()
        {
            text.push_str(&message.content);
            text.push('\n');
        }
        if tx.send(item).await.is_err() || failed {
            return false;
        }
    }
    true
}

async fn run(
    inner: Arc<dyn AgentCapability>,
    min_subtasks: usize,
    prompt: String,
    config: CapabilityConfig,
    tx: Sender,
) {
    let planning = config
        .clone()
        .with_system_prompt(DECOMPOSE_SYSTEM_PROMPT)
        .without_tools()
        .with_max_turns(1);

    let mut reply = String::new();
    if !forward(&inner, prompt.clone(), &planning, &tx, Some(&mut reply)).await {
        return;
    }

    let subtasks = parse_subtasks(&reply);
    if subtasks.len() < min_subtasks {
        debug!(count = subtasks.len(), "Too few subtasks, running directly");
        forward(&inner, prompt, &config, &tx, None).await;
        return;
    }

    let total = subtasks.len();
    info!(total, "Executing subtasks");
    let mut done: Vec<String> = Vec::with_capacity(total);
    for (i, subtask) in subtasks.into_iter().enumerate() {
        let index = i + 1;
        let announce = DialogueMessage::text(format!("Subtask {index}/{total}: {subtask}"))
            .with_metadata("subtask", json!(index))
            .with_metadata("subtask_total", json!(total));
        if tx.send(Ok(announce)).await.is_err() {
            return;
        }

        let sub_prompt = subtask_prompt(&prompt, &subtask, index, total, &done);
        if !forward(&inner, sub_prompt, &config, &tx, None).await {
            return;
        }
        done.push(subtask);
    }
}

#[async_trait]
impl AgentCapability for SubtaskCapability {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        prompt: String,
        config: &CapabilityConfig,
    ) -> Result<CapabilityStream, CapabilityError> {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        tokio::spawn(run(
            self.inner.clone(),
            self.min_subtasks,
            prompt,
            config.clone(),
            tx,
        ));
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptStep, ScriptedCapability};

    async fn collect(mut rx: CapabilityStream) -> Vec<Result<DialogueMessage, CapabilityError>> {
        let mut out = Vec::new();
        while let Some(item) = rx.recv().await {
            out.push(item);
        }
        out
    }

    #[test]
    fn parses_numbered_lines() {
        let text = "Sure:\n1. Create the file\n2) **Fill** it\n- not numbered\n3. Verify\n";
        assert_eq!(
            parse_subtasks(text),
            vec!["Create the file", "Fill it", "Verify"]
        );
    }

    #[tokio::test]
    async fn runs_each_subtask_in_order() {
        let inner = Arc::new(
            ScriptedCapability::new("inner")
                .then(vec![ScriptStep::text("1. Write a.txt\n2. Write b.txt")])
                .then(vec![ScriptStep::text("wrote a")])
                .then(vec![ScriptStep::text("wrote b")]),
        );
        let capability = SubtaskCapability::new(inner.clone());

        let items = collect(
            capability
                .invoke("two files".into(), &CapabilityConfig::executor())
                .await
                .unwrap(),
        )
        .await;
        let contents: Vec<_> = items
            .into_iter()
            .map(|i| i.unwrap().content)
            .collect();

        assert_eq!(
            contents,
            vec![
                "1. Write a.txt\n2. Write b.txt",
                "Subtask 1/2: Write a.txt",
                "wrote a",
                "Subtask 2/2: Write b.txt",
                "wrote b",
            ]
        );

        let configs = inner.configs();
        assert!(!configs[0].tools_enabled);
        assert_eq!(configs[0].max_turns, 1);
        assert!(configs[1].tools_enabled);

        let prompts = inner.prompts();
        assert!(prompts[2].contains("Current subtask (2/2)"));
        assert!(prompts[2].contains("1. Write a.txt"));
        assert_eq!(capability.name(), "subtasks:inner");
    }

    #[tokio::test]
    async fn single_item_runs_directly() {
        let inner = Arc::new(
            ScriptedCapability::new("inner")
                .then(vec![ScriptStep::text("1. Just do it")])
                .then(vec![ScriptStep::text("did it")]),
        );
        let capability = SubtaskCapability::new(inner.clone());

        let items = collect(
            capability
                .invoke("small".into(), &CapabilityConfig::executor())
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(items.len(), 2);
        assert_eq!(inner.invocations(), 2);
        assert_eq!(inner.prompts()[1], "small");
    }

    #[tokio::test]
    async fn failure_stops_remaining_subtasks() {
        let inner = Arc::new(
            ScriptedCapability::new("inner")
                .then(vec![ScriptStep::text("1. first\n2. second")])
                .then(vec![ScriptStep::fail("tool crashed")])
                .then(vec![ScriptStep::text("never")]),
        );
        let capability = SubtaskCapability::new(inner.clone());

        let items = collect(
            capability
                .invoke("work".into(), &CapabilityConfig::executor())
                .await
                .unwrap(),
        )
        .await;

        assert!(items.last().unwrap().is_err());
        assert_eq!(inner.invocations(), 2);
    }
}
