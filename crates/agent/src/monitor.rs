//! Read-only view of executions for UIs and operators.

use chrono::{DateTime, Utc};
use reagent_core::error::MemoryError;
use reagent_core::scratchpad::Scratchpad;
use reagent_core::value::parameters_to_json;
use reagent_memory::AgentMemory;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Thought,
    Action,
    FinalAnswer,
    Observation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// One row of an execution timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub step: u32,
    pub title: String,
    pub content: String,
    pub icon: &'static str,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

pub struct ExecutionMonitor {
    memory: Arc<AgentMemory>,
}

impl ExecutionMonitor {
    pub fn new(memory: Arc<AgentMemory>) -> Self {
        Self { memory }
    }

    pub async fn get_scratchpad(&self, execution_id: &str) -> Result<Option<Scratchpad>, MemoryError> {
        self.memory.get_scratchpad(execution_id).await
    }

    /// Stored timeline of an execution, empty when nothing is stored.
    pub async fn timeline(&self, execution_id: &str) -> Result<Vec<TimelineEntry>, MemoryError> {
        Ok(self
            .get_scratchpad(execution_id)
            .await?
            .map(|pad| timeline(&pad))
            .unwrap_or_default())
    }
}

/// Thoughts, actions and observations merged in timestamp order.
///
/// Reasoning-only actions carry nothing worth showing and are left out.
pub fn timeline(scratchpad: &Scratchpad) -> Vec<TimelineEntry> {
    let mut entries = Vec::new();

    for thought in &scratchpad.thoughts {
        let fallback = thought.metadata.contains_key("fallback");
        entries.push(TimelineEntry {
            kind: EntryKind::Thought,
            step: thought.step_number,
            title: format!("Thought {} ({:.0}%)", thought.step_number + 1, thought.confidence * 100.0),
            content: thought.content.clone(),
            icon: "💭",
            severity: if fallback { Severity::Warning } else { Severity::Info },
            timestamp: thought.created_at,
        });
    }

    for action in &scratchpad.actions {
        if action.is_final_answer {
            entries.push(TimelineEntry {
                kind: EntryKind::FinalAnswer,
                step: action.step_number,
                title: "Final Answer".into(),
                content: action.final_answer.clone().unwrap_or_default(),
                icon: "✅",
                severity: Severity::Success,
                timestamp: action.created_at,
            });
        } else if action.requires_tool() {
            entries.push(TimelineEntry {
                kind: EntryKind::Action,
                step: action.step_number,
                title: format!("Action: {}", action.tool_name),
                content: parameters_to_json(&action.parameters).to_string(),
                icon: "🔧",
                severity: Severity::Info,
                timestamp: action.created_at,
            });
        }
    }

    for observation in &scratchpad.observations {
        let (icon, severity) = if observation.is_success {
            ("👁", Severity::Success)
        } else {
            ("❌", Severity::Error)
        };
        entries.push(TimelineEntry {
            kind: EntryKind::Observation,
            step: observation.step_number,
            title: format!("Observation: {}", observation.tool_name),
            content: observation.content.clone(),
            icon,
            severity,
            timestamp: observation.created_at,
        });
    }

    // Stable: equal timestamps keep thought, action, observation order.
    entries.sort_by_key(|e| e.timestamp);
    entries
}
