//! End-to-end tests for the Disclaude dialogue loop.
//!
//! These wire real tools, a real file plan store, and LLM capabilities over
//! scripted providers, then drive a task specification from disk to a
//! terminal state.

use std::sync::Arc;

use disclaude_core::{CapabilityConfig, DomainEvent, EventBus, TaskSpecification};
use disclaude_dialogue::test_helpers::{
    SequentialMockProvider, make_text_response, make_tool_call, make_tool_call_response,
};
use disclaude_dialogue::{DialogueOrchestrator, DialogueOutcome, DialogueSettings, LlmCapability};
use disclaude_store::{FilePlanStore, SessionStore};
use disclaude_tools::default_registry;
use serde_json::json;

const PLAN_REPLY: &str = "Plan first.\n\n```json\n\
{\"title\": \"Greeting\", \"description\": \"Create hello.txt\", \
\"subtasks\": [{\"title\": \"Write hello.txt\"}, {\"title\": \"Confirm\"}]}\n\
```\n\nExecutor: write hello.txt containing 'hi'.";

struct Fixture {
    _dir: tempfile::TempDir,
    spec_path: std::path::PathBuf,
    workspace: std::path::PathBuf,
    tasks_dir: std::path::PathBuf,
}

fn fixture(task_id: &str, request: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let workspace = dir.path().join("workspace");
    let tasks_dir = workspace.join("tasks");
    let task_dir = tasks_dir.join(task_id);
    std::fs::create_dir_all(&task_dir).unwrap();

    let spec_path = task_dir.join("Task.md");
    let spec = TaskSpecification::new(task_id, request).with_chat_id("oc_1");
    std::fs::write(&spec_path, spec.render()).unwrap();

    Fixture {
        _dir: dir,
        spec_path,
        workspace,
        tasks_dir,
    }
}

fn orchestrator(
    fx: &Fixture,
    evaluator: Arc<SequentialMockProvider>,
    executor: Arc<SequentialMockProvider>,
    max_iterations: u32,
) -> DialogueOrchestrator {
    let tools = Arc::new(default_registry(&fx.workspace, "task_done"));
    let evaluator = LlmCapability::new(evaluator, tools.clone(), "glm-4.7").with_name("evaluator");
    let executor = LlmCapability::new(executor, tools, "glm-4.7").with_name("executor");

    DialogueOrchestrator::new(Arc::new(evaluator), Arc::new(executor))
        .with_evaluator_config(
            CapabilityConfig::evaluator()
                .with_allowed_tools(vec!["task_done".into()])
                .with_max_turns(2),
        )
        .with_executor_config(
            CapabilityConfig::executor()
                .with_allowed_tools(vec!["file_read".into(), "file_write".into()]),
        )
        .with_plan_store(Arc::new(FilePlanStore::new(&fx.tasks_dir)))
        .with_settings(DialogueSettings {
            max_iterations,
            ..DialogueSettings::default()
        })
}

#[tokio::test]
async fn e2e_write_file_then_complete() {
    let fx = fixture("om_hello", "write hello.txt");

    let evaluator = Arc::new(SequentialMockProvider::new(vec![
        // iteration 1
        make_text_response(PLAN_REPLY),
        // iteration 2
        make_tool_call_response(
            vec![make_tool_call("task_done", json!({"summary": "hello.txt written"}))],
            "The file exists.",
        ),
        make_text_response("Finished."),
    ]));
    let executor = Arc::new(SequentialMockProvider::new(vec![
        make_tool_call_response(
            vec![make_tool_call(
                "file_write",
                json!({"path": "hello.txt", "content": "hi"}),
            )],
            "",
        ),
        make_text_response("Wrote hello.txt"),
    ]));

    let bus = Arc::new(EventBus::default());
    let mut events = bus.subscribe();
    let orchestrator =
        orchestrator(&fx, evaluator.clone(), executor.clone(), 5).with_event_bus(bus);

    let (messages, outcome) = orchestrator
        .run_dialogue(&fx.spec_path, "", "sess-e2e")
        .await
        .unwrap()
        .drain()
        .await
        .unwrap();

    assert_eq!(outcome, DialogueOutcome::Completed { iterations: 2 });
    assert_eq!(
        std::fs::read_to_string(fx.workspace.join("hello.txt")).unwrap(),
        "hi"
    );
    assert!(messages.iter().any(|m| m.tool_name() == Some("task_done")));
    assert!(messages.iter().all(|m| m.message_type() != "error"));

    // Iteration 2's evaluation carried iteration 1's executor output.
    let eval_requests = evaluator.requests();
    let second_prompt = &eval_requests[1].messages.last().unwrap().content;
    assert!(second_prompt.contains("Wrote hello.txt"));

    // The plan from iteration 1 was persisted once, under the task id
    // derived from the task directory.
    let plan = FilePlanStore::new(&fx.tasks_dir)
        .load("om_hello")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(plan.title, "Greeting");
    assert_eq!(plan.total_steps, 2);
    assert_eq!(plan.original_request, "write hello.txt");

    let mut saved = 0;
    let mut finished = None;
    while let Ok(event) = events.try_recv() {
        match &*event {
            DomainEvent::PlanSaved { .. } => saved += 1,
            DomainEvent::DialogueFinished { outcome, .. } => finished = Some(outcome.clone()),
            _ => {}
        }
    }
    assert_eq!(saved, 1);
    assert_eq!(finished.as_deref(), Some("completed"));

    orchestrator.cleanup();
    assert_eq!(orchestrator.session_snapshot().current_iteration, 0);
}

#[tokio::test]
async fn e2e_executor_outside_workspace_is_refused() {
    let fx = fixture("om_escape", "read /etc/passwd");

    let evaluator = Arc::new(SequentialMockProvider::new(vec![make_text_response(
        "Read the file.",
    )]));
    let executor = Arc::new(SequentialMockProvider::new(vec![
        make_tool_call_response(
            vec![make_tool_call("file_read", json!({"path": "../../etc/passwd"}))],
            "",
        ),
        make_text_response("Could not read it."),
    ]));

    let orchestrator = orchestrator(&fx, evaluator, executor, 1);
    let (messages, outcome) = orchestrator
        .run_dialogue(&fx.spec_path, "", "sess-escape")
        .await
        .unwrap()
        .drain()
        .await
        .unwrap();

    assert_eq!(outcome, DialogueOutcome::Exhausted { iterations: 1 });
    let report = messages
        .iter()
        .find(|m| m.metadata.get("tool_result").is_some())
        .unwrap();
    assert_eq!(report.metadata["success"], false);
}

#[tokio::test]
async fn e2e_session_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.json");

    let store = SessionStore::load(&path).await;
    store.set("oc_1", "sess-a").await;

    let reloaded = SessionStore::load(&path).await;
    assert_eq!(reloaded.get("oc_1").await.as_deref(), Some("sess-a"));
}
