//! Domain events published by the dialogue loop.
//!
//! Observers (a chat adapter, a status page) subscribe to the bus instead
//! of being wired into the loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    DialogueStarted {
        session_id: String,
        task_id: String,
        max_iterations: u32,
        timestamp: DateTime<Utc>,
    },

    IterationCompleted {
        session_id: String,
        iteration: u32,
        task_completed: bool,
        messages_forwarded: usize,
        timestamp: DateTime<Utc>,
    },

    PlanSaved {
        session_id: String,
        task_id: String,
        total_steps: usize,
        timestamp: DateTime<Utc>,
    },

    /// Extraction found a plan but the store rejected it.
    PlanSaveFailed {
        session_id: String,
        task_id: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    DialogueFinished {
        session_id: String,
        /// "completed", "exhausted" or "abandoned"
        outcome: String,
        iterations: u32,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::IterationCompleted {
            session_id: "s1".into(),
            iteration: 2,
            task_completed: true,
            messages_forwarded: 5,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::IterationCompleted {
                iteration,
                task_completed,
                ..
            } => {
                assert_eq!(*iteration, 2);
                assert!(task_completed);
            }
            other => panic!("Expected IterationCompleted, got {other:?}"),
        }
    }

    #[test]
    fn no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::DialogueFinished {
            session_id: "s1".into(),
            outcome: "exhausted".into(),
            iterations: 3,
            timestamp: Utc::now(),
        });
    }
}
