//! Message de-duplication and sequencing for one dialogue session.
//!
//! A retried sub-call can replay messages that were already forwarded. The
//! tracker remembers what it has forwarded and suppresses exact repeats.
//! Keys are kept verbatim (no hashing down to a digest), so a message that
//! was never seen before is never reported as a duplicate. The history is
//! bounded; evicting an old key can only let a late repeat through.

use std::collections::{HashSet, VecDeque};

use disclaude_core::DialogueMessage;

pub const DEFAULT_TRACKER_CAPACITY: usize = 4096;

/// Identity of a message for de-duplication purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MessageKey {
    iteration: u32,
    /// Serialized [`disclaude_core::MessageKind`], which carries the type tag
    /// and, for tool invocations, the tool name and input.
    kind: String,
    content: String,
    metadata: String,
}

impl MessageKey {
    fn new(iteration: u32, message: &DialogueMessage) -> Self {
        Self {
            iteration,
            kind: serde_json::to_string(&message.kind)
                .unwrap_or_else(|_| message.message_type().to_string()),
            content: message.content.clone(),
            metadata: serde_json::to_string(&message.metadata).unwrap_or_default(),
        }
    }
}

#[derive(Debug)]
pub struct MessageTracker {
    capacity: usize,
    iteration: u32,
    seen: HashSet<MessageKey>,
    order: VecDeque<MessageKey>,
    forwarded: u64,
}

impl MessageTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            iteration: 0,
            seen: HashSet::new(),
            order: VecDeque::new(),
            forwarded: 0,
        }
    }

    /// Scope subsequent observations to `iteration`. The same progress line
    /// in two different iterations is forwarded both times.
    pub fn enter_iteration(&mut self, iteration: u32) {
        self.iteration = iteration;
    }

    /// `true` if the message is new and should be forwarded.
    pub fn observe(&mut self, message: &DialogueMessage) -> bool {
        let key = MessageKey::new(self.iteration, message);
        if self.seen.contains(&key) {
            return false;
        }

        self.seen.insert(key.clone());
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }

        self.forwarded += 1;
        true
    }

    /// Observe and, if new, stamp the message with its stream position.
    pub fn track(&mut self, mut message: DialogueMessage) -> Option<DialogueMessage> {
        if !self.observe(&message) {
            return None;
        }
        message.sequence = Some(self.forwarded);
        Some(message)
    }

    /// Number of messages reported as new since the last reset.
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Forget everything. Idempotent.
    pub fn reset(&mut self) {
        self.iteration = 0;
        self.seen.clear();
        self.order.clear();
        self.forwarded = 0;
    }
}

impl Default for MessageTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TRACKER_CAPACITY)
    }
}
