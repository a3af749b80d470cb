//! `disclaude run` — Drive one task through the dialogue loop.

use std::path::PathBuf;
use std::sync::Arc;

use disclaude_config::AppConfig;
use disclaude_core::{
    CapabilityConfig, DialogueMessage, MessageKind, PlanStore, Provider, TaskSpecification,
    ToolRegistry,
};
use disclaude_dialogue::prompts::{EXECUTOR_SYSTEM_PROMPT, evaluator_system_prompt};
use disclaude_dialogue::{
    DialogueOrchestrator, DialogueOutcome, DialogueSettings, LlmCapability, SubtaskCapability,
};
use disclaude_store::{FilePlanStore, InMemoryPlanStore, SessionStore};
use disclaude_tools::default_registry;

pub struct RunArgs {
    pub task_file: PathBuf,
    pub request: Option<String>,
    pub session: Option<String>,
    pub max_iterations: Option<u32>,
    pub no_plan: bool,
    pub subtasks: bool,
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(max) = args.max_iterations {
        config.dialogue.max_iterations = max;
        config.validate()?;
    }

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    GLM_API_KEY=...         (preferred)");
        eprintln!("    ANTHROPIC_API_KEY=...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }
    let agent = config.resolve_agent()?;

    // Resolve the session: explicit, else the chat's stored one, else new.
    let spec = TaskSpecification::load(&args.task_file).await?;
    let sessions = SessionStore::load(&config.workspace.sessions_file).await;
    let session_id = match (&args.session, &spec.chat_id) {
        (Some(id), _) => id.clone(),
        (None, Some(chat_id)) => match sessions.get(chat_id).await {
            Some(existing) => existing,
            None => uuid::Uuid::new_v4().to_string(),
        },
        (None, None) => uuid::Uuid::new_v4().to_string(),
    };
    if let Some(chat_id) = &spec.chat_id {
        sessions.set(chat_id.clone(), session_id.clone()).await;
    }

    let provider = disclaude_providers::from_resolved(&agent);
    let tools = Arc::new(default_registry(
        &config.workspace.dir,
        &config.dialogue.completion_tool,
    ));
    let plan_store: Arc<dyn PlanStore> = if args.no_plan {
        Arc::new(InMemoryPlanStore::new())
    } else {
        Arc::new(FilePlanStore::new(&config.workspace.tasks_dir))
    };
    let decompose = args.subtasks || config.dialogue.decompose_subtasks;

    let orchestrator =
        build_orchestrator(&config, provider, tools, &agent.model, plan_store, decompose);

    println!("🚀 Task {} (session {session_id})", spec.task_id);
    println!();

    let request = args.request.unwrap_or_default();
    let mut stream = orchestrator
        .run_dialogue(&args.task_file, &request, &session_id)
        .await?;
    while let Some(message) = stream.recv().await {
        render(&message);
    }
    let outcome = stream.finish().await;
    orchestrator.cleanup();

    println!();
    match outcome? {
        DialogueOutcome::Completed { iterations } => {
            println!("✅ Completed after {iterations} iteration(s)");
        }
        DialogueOutcome::Exhausted { iterations } => {
            println!("⚠️  Stopped after {iterations} iteration(s) without completion");
        }
        DialogueOutcome::Abandoned { iteration } => {
            println!("⏹️  Abandoned during iteration {iteration}");
        }
    }

    Ok(())
}

/// Wire the two LLM capabilities, their role configurations, and the plan
/// store into an orchestrator.
pub fn build_orchestrator(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    model: &str,
    plan_store: Arc<dyn PlanStore>,
    decompose: bool,
) -> DialogueOrchestrator {
    let dialogue = &config.dialogue;
    let llm = |name: &str| {
        LlmCapability::new(provider.clone(), tools.clone(), model)
            .with_name(name)
            .with_temperature(config.agent.temperature)
            .with_max_tokens(config.agent.max_tokens)
    };

    let evaluator = Arc::new(llm("evaluator"));
    let executor: Arc<dyn disclaude_core::AgentCapability> = if decompose {
        Arc::new(SubtaskCapability::new(Arc::new(llm("executor"))))
    } else {
        Arc::new(llm("executor"))
    };

    let mut evaluator_config = CapabilityConfig::evaluator()
        .with_system_prompt(evaluator_system_prompt(&dialogue.completion_tool))
        .with_allowed_tools(vec![dialogue.completion_tool.clone()])
        .with_max_turns(dialogue.evaluator_max_turns);
    if let Some(marker) = &dialogue.completion_marker {
        evaluator_config = evaluator_config.with_completion_marker(marker.clone());
    }
    let executor_config = CapabilityConfig::executor()
        .with_system_prompt(EXECUTOR_SYSTEM_PROMPT)
        .with_allowed_tools(vec!["file_read".into(), "file_write".into()])
        .with_max_turns(dialogue.executor_max_turns);

    DialogueOrchestrator::new(evaluator, executor)
        .with_evaluator_config(evaluator_config)
        .with_executor_config(executor_config)
        .with_plan_store(plan_store)
        .with_settings(DialogueSettings::from(dialogue))
}

fn render(message: &DialogueMessage) {
    match &message.kind {
        MessageKind::Text => {
            if let Some(tool) = message.metadata.get("tool_result").and_then(|v| v.as_str()) {
                println!("   ↳ {tool}: {}", message.content);
            } else {
                println!("{}", message.content);
            }
        }
        MessageKind::ToolUse { tool, input } => println!("🔧 {tool} {input}"),
        MessageKind::Error => eprintln!("❌ {}", message.content),
        MessageKind::TaskCompletion => println!("✅ {}", message.content),
    }
}
