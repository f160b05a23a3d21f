//! Agent event system: progress notifications for observers.
//!
//! The loop publishes an event at each phase boundary. UIs, loggers and
//! tests subscribe without the loop knowing who listens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::scratchpad::StopReason;

/// All agent events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentEvent {
    /// An execution began
    ExecutionStarted {
        execution_id: String,
        input_preview: String,
        max_iterations: u32,
        timestamp: DateTime<Utc>,
    },

    /// A thought was recorded
    ThoughtGenerated {
        execution_id: String,
        step: u32,
        confidence: f64,
        content_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool invocation is about to start
    ActionStarted {
        execution_id: String,
        step: u32,
        tool_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool invocation produced an observation
    ObservationReceived {
        execution_id: String,
        step: u32,
        tool_id: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The scratchpad was completed
    ExecutionCompleted {
        execution_id: String,
        steps: u32,
        reason: StopReason,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for agent events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AgentEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// First `max` characters of `text`, for event previews.
pub fn preview(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
