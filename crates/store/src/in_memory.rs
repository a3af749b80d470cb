//! In-memory plan store. Plans are lost when the process exits.

use async_trait::async_trait;
use disclaude_core::error::PlanStoreError;
use disclaude_core::plan::{PlanStore, TaskPlan};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryPlanStore {
    plans: Arc<RwLock<Vec<TaskPlan>>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every plan saved so far, in save order.
    pub async fn saved(&self) -> Vec<TaskPlan> {
        self.plans.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.plans.read().await.len()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn save(&self, plan: TaskPlan) -> Result<(), PlanStoreError> {
        self.plans.write().await.push(plan);
        Ok(())
    }
}
