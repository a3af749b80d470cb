//! `disclaude task` — Task specification files and their saved plans.

use disclaude_config::AppConfig;
use disclaude_core::TaskSpecification;
use disclaude_store::FilePlanStore;

/// File name of a specification inside its task directory. The task id is
/// taken from the directory name.
const SPEC_FILE_NAME: &str = "Task.md";

pub async fn new(
    request: String,
    id: Option<String>,
    chat_id: Option<String>,
    user_id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let task_id = id.unwrap_or_else(|| format!("task_{}", uuid::Uuid::new_v4().simple()));
    let mut spec = TaskSpecification::new(&task_id, request);
    if let Some(chat_id) = chat_id {
        spec = spec.with_chat_id(chat_id);
    }
    if let Some(user_id) = user_id {
        spec = spec.with_user_id(user_id);
    }

    let dir = config.workspace.tasks_dir.join(&task_id);
    let path = dir.join(SPEC_FILE_NAME);
    if path.exists() {
        return Err(format!("Task specification already exists: {}", path.display()).into());
    }
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(&path, spec.render()).await?;

    tracing::info!(task_id = %task_id, path = %path.display(), "Task specification written");
    println!("{}", path.display());
    Ok(())
}

pub async fn plan(task_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = FilePlanStore::new(&config.workspace.tasks_dir);

    match store.load(task_id).await? {
        Some(plan) => println!("{}", serde_json::to_string_pretty(&plan)?),
        None => println!("No plan saved for task {task_id}"),
    }
    Ok(())
}
