//! File-backed plan store.
//!
//! Each plan is written as pretty-printed JSON to
//! `<tasks_dir>/<task_id>/plan.json`, next to the task specification. The
//! write goes to a temporary sibling first and is renamed into place, so a
//! reader never observes a half-written plan.

use async_trait::async_trait;
use disclaude_core::error::PlanStoreError;
use disclaude_core::plan::{PlanStore, TaskPlan};
use std::path::{Path, PathBuf};
use tracing::debug;

const PLAN_FILE: &str = "plan.json";

pub struct FilePlanStore {
    tasks_dir: PathBuf,
}

impl FilePlanStore {
    pub fn new(tasks_dir: impl Into<PathBuf>) -> Self {
        Self {
            tasks_dir: tasks_dir.into(),
        }
    }

    /// Where the plan for `task_id` is (or would be) stored.
    pub fn plan_path(&self, task_id: &str) -> PathBuf {
        self.tasks_dir.join(task_id).join(PLAN_FILE)
    }

    /// Read a previously saved plan, if any.
    pub async fn load(&self, task_id: &str) -> Result<Option<TaskPlan>, PlanStoreError> {
        let path = self.plan_path(task_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PlanStoreError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };
        Ok(Some(serde_json::from_str(&content)?))
    }
}

fn validate_task_id(task_id: &str) -> Result<(), PlanStoreError> {
    let bad = task_id.is_empty()
        || task_id == "."
        || task_id == ".."
        || task_id.contains(['/', '\\']);
    if bad {
        return Err(PlanStoreError::Storage(format!(
            "Invalid task id for a plan directory: '{task_id}'"
        )));
    }
    Ok(())
}

async fn write_atomic(path: &Path, content: &str) -> Result<(), PlanStoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            PlanStoreError::Storage(format!("Failed to create plan directory: {e}"))
        })?;
    }

    let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, content)
        .await
        .map_err(|e| PlanStoreError::Storage(format!("Failed to write plan file: {e}")))?;

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(PlanStoreError::Storage(format!(
            "Failed to move plan into place: {e}"
        )));
    }
    Ok(())
}

#[async_trait]
impl PlanStore for FilePlanStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn save(&self, plan: TaskPlan) -> Result<(), PlanStoreError> {
        validate_task_id(&plan.task_id)?;
        let path = self.plan_path(&plan.task_id);
        let content = serde_json::to_string_pretty(&plan)?;
        write_atomic(&path, &content).await?;
        debug!(task_id = %plan.task_id, path = %path.display(), steps = plan.total_steps, "Plan saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use disclaude_core::plan::PlanSubtask;

    fn plan(task_id: &str) -> TaskPlan {
        TaskPlan::new(
            task_id,
            "write hello.txt",
            "Hello file",
            "Create a greeting file",
            vec![PlanSubtask {
                sequence: 1,
                title: "Write the file".into(),
                description: String::new(),
            }],
        )
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePlanStore::new(dir.path());

        store.save(plan("om_1")).await.unwrap();

        let path = dir.path().join("om_1").join("plan.json");
        assert!(path.exists());
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"taskId\": \"om_1\""));
        assert!(raw.contains("\"totalSteps\": 1"));

        let loaded = store.load("om_1").await.unwrap().unwrap();
        assert_eq!(loaded.title, "Hello file");
        assert_eq!(loaded.subtasks.len(), 1);
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePlanStore::new(dir.path());
        store.save(plan("om_2")).await.unwrap();
        store.save(plan("om_2")).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path().join("om_2"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["plan.json"]);
    }

    #[tokio::test]
    async fn missing_plan_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePlanStore::new(dir.path());
        assert!(store.load("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_path_like_task_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePlanStore::new(dir.path());
        let err = store.save(plan("../escape")).await.unwrap_err();
        assert!(matches!(err, PlanStoreError::Storage(_)));
    }
}
