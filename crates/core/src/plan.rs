//! Task plans and the plan persistence seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PlanStoreError;

/// A best-effort structured decomposition of a task, extracted once from the
/// first iteration's output.
///
/// Serialized in camelCase: `{ taskId, originalRequest, title, description,
/// subtasks, totalSteps, createdAt }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPlan {
    pub task_id: String,
    pub original_request: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subtasks: Vec<PlanSubtask>,
    pub total_steps: usize,
    pub created_at: DateTime<Utc>,
}

impl TaskPlan {
    pub fn new(
        task_id: impl Into<String>,
        original_request: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        subtasks: Vec<PlanSubtask>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            original_request: original_request.into(),
            title: title.into(),
            description: description.into(),
            total_steps: subtasks.len(),
            subtasks,
            created_at: Utc::now(),
        }
    }
}

/// One ordered step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSubtask {
    /// 1-based position in the plan.
    pub sequence: usize,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Where extracted plans go. Invoked at most once per dialogue session.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// The name of this store (e.g., "file", "in_memory").
    fn name(&self) -> &str;

    /// Persist a plan. Ownership of the plan transfers to the store.
    async fn save(&self, plan: TaskPlan) -> Result<(), PlanStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_steps_follows_subtasks() {
        let plan = TaskPlan::new(
            "om_1",
            "write hello.txt",
            "Hello file",
            "",
            vec![
                PlanSubtask {
                    sequence: 1,
                    title: "Create file".into(),
                    description: String::new(),
                },
                PlanSubtask {
                    sequence: 2,
                    title: "Verify".into(),
                    description: String::new(),
                },
            ],
        );
        assert_eq!(plan.total_steps, 2);
    }

    #[test]
    fn serializes_camel_case() {
        let plan = TaskPlan::new("om_1", "req", "Title", "Desc", vec![]);
        let json = serde_json::to_string(&plan).unwrap();
        assert!(json.contains(r#""taskId":"om_1""#));
        assert!(json.contains(r#""originalRequest":"req""#));
        assert!(json.contains(r#""totalSteps":0"#));
        assert!(json.contains("createdAt"));
    }
}
