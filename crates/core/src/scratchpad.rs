//! The scratchpad: an append-only record of one ReAct execution.
//!
//! Every execution owns exactly one [`Scratchpad`]. The loop controller is
//! its single writer; memory and monitoring only ever read snapshots.
//! Entries are tagged with the step they were recorded in, so the
//! transcript can be rebuilt in order even when a step has no observation
//! (pure reasoning or final answer).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::value::{Parameters, parameters_to_json};

/// Free-form metadata attached to thoughts, actions and observations.
pub type Metadata = BTreeMap<String, serde_json::Value>;

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One reasoning step produced by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thought {
    pub id: String,
    pub execution_id: String,
    pub step_number: u32,
    /// The reasoning text (the `Thought:` section when present).
    pub content: String,
    /// Heuristic confidence in `[0, 1]`.
    pub confidence: f64,
    pub is_action_required: bool,
    pub suggested_action: Option<String>,
    pub reasoning: String,
    /// Full model output the action is built from.
    pub raw_output: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl Thought {
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: new_id(),
            execution_id: String::new(),
            step_number: 0,
            raw_output: content.clone(),
            reasoning: content.clone(),
            content,
            confidence: 0.5,
            is_action_required: false,
            suggested_action: None,
            metadata: Metadata::new(),
            created_at: Utc::now(),
        }
    }
}

/// What the agent decided to do after a thought.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub execution_id: String,
    pub step_number: u32,
    /// Normalized tool identifier (`web_search`).
    pub tool_id: String,
    /// Tool name as the model wrote it (`Web Search`).
    pub tool_name: String,
    #[serde(default)]
    pub parameters: Parameters,
    /// Raw `Action Input` text before parsing.
    pub input: String,
    pub is_final_answer: bool,
    pub final_answer: Option<String>,
    pub reasoning: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl Action {
    /// An empty, non-final action. Builders fill in the rest.
    pub fn new() -> Self {
        Self {
            id: new_id(),
            execution_id: String::new(),
            step_number: 0,
            tool_id: String::new(),
            tool_name: String::new(),
            parameters: Parameters::new(),
            input: String::new(),
            is_final_answer: false,
            final_answer: None,
            reasoning: None,
            confidence: 0.0,
            metadata: Metadata::new(),
            created_at: Utc::now(),
        }
    }

    pub fn final_answer(answer: impl Into<String>) -> Self {
        Self {
            is_final_answer: true,
            final_answer: Some(answer.into()),
            ..Self::new()
        }
    }

    /// True when executing this action means invoking a tool.
    pub fn requires_tool(&self) -> bool {
        !self.is_final_answer && !self.tool_id.is_empty()
    }
}

impl Default for Action {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_final_answer {
            write!(
                f,
                "Action[{}]: Final Answer - {}",
                self.step_number,
                self.final_answer.as_deref().unwrap_or_default()
            )
        } else {
            write!(
                f,
                "Action[{}]: {} with {} parameters",
                self.step_number,
                self.tool_name,
                self.parameters.len()
            )
        }
    }
}

/// Classification of a failed observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationErrorKind {
    /// Rejected before execution: unknown, disabled or unresolvable tool.
    ToolUnavailable,
    InvalidParameters,
    Timeout,
    Unauthorized,
    ExecutionError,
    Cancelled,
}

impl ObservationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToolUnavailable => "tool_unavailable",
            Self::InvalidParameters => "invalid_parameters",
            Self::Timeout => "timeout",
            Self::Unauthorized => "unauthorized",
            Self::ExecutionError => "execution_error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// The outcome of executing an action, as fed back to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    pub execution_id: String,
    pub step_number: u32,
    pub tool_id: String,
    pub tool_name: String,
    pub is_success: bool,
    /// Bounded, model-facing text.
    pub content: String,
    pub error_message: Option<String>,
    pub error_kind: Option<ObservationErrorKind>,
    /// Heuristic relevance in `[0, 1]`.
    pub relevance: f64,
    pub execution_time: Duration,
    pub raw_data: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl Observation {
    pub fn success(tool_id: impl Into<String>, tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            execution_id: String::new(),
            step_number: 0,
            tool_id: tool_id.into(),
            tool_name: tool_name.into(),
            is_success: true,
            content: content.into(),
            error_message: None,
            error_kind: None,
            relevance: 1.0,
            execution_time: Duration::ZERO,
            raw_data: None,
            metadata: Metadata::new(),
            created_at: Utc::now(),
        }
    }

    pub fn failure(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        kind: ObservationErrorKind,
        error_message: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            is_success: false,
            error_message: Some(error_message.into()),
            error_kind: Some(kind),
            relevance: 0.0,
            ..Self::success(tool_id, tool_name, content)
        }
    }

    pub fn has_error(&self) -> bool {
        !self.is_success || self.error_message.as_deref().is_some_and(|m| !m.is_empty())
    }
}

/// Why an execution stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    FinalAnswer,
    MaxIterations,
    ExecutionTimeout,
    RepeatedFailures,
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FinalAnswer => "final_answer",
            Self::MaxIterations => "max_iterations",
            Self::ExecutionTimeout => "execution_timeout",
            Self::RepeatedFailures => "repeated_failures",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// The full record of one execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scratchpad {
    pub execution_id: String,
    pub original_input: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub current_step: u32,
    pub is_completed: bool,
    pub final_answer: Option<String>,
    pub stop_reason: Option<StopReason>,
    pub thoughts: Vec<Thought>,
    pub actions: Vec<Action>,
    pub observations: Vec<Observation>,
}

impl Scratchpad {
    pub fn new(execution_id: impl Into<String>, original_input: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            original_input: original_input.into(),
            started_at: Utc::now(),
            completed_at: None,
            current_step: 0,
            is_completed: false,
            final_answer: None,
            stop_reason: None,
            thoughts: Vec::new(),
            actions: Vec::new(),
            observations: Vec::new(),
        }
    }

    /// Record a thought in the current step. Returns the stored copy.
    pub fn add_thought(&mut self, mut thought: Thought) -> Result<&Thought> {
        self.ensure_open()?;
        thought.step_number = self.current_step;
        thought.execution_id = self.execution_id.clone();
        self.thoughts.push(thought);
        Ok(&self.thoughts[self.thoughts.len() - 1])
    }

    pub fn add_action(&mut self, mut action: Action) -> Result<&Action> {
        self.ensure_open()?;
        action.step_number = self.current_step;
        action.execution_id = self.execution_id.clone();
        self.actions.push(action);
        Ok(&self.actions[self.actions.len() - 1])
    }

    pub fn add_observation(&mut self, mut observation: Observation) -> Result<&Observation> {
        self.ensure_open()?;
        observation.step_number = self.current_step;
        observation.execution_id = self.execution_id.clone();
        self.observations.push(observation);
        Ok(&self.observations[self.observations.len() - 1])
    }

    /// Close the current step. No-op once completed.
    pub fn complete_step(&mut self) {
        if !self.is_completed {
            self.current_step += 1;
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_completed {
            return Err(Error::AlreadyCompleted(self.execution_id.clone()));
        }
        Ok(())
    }

    /// Mark the execution finished. A completed scratchpad is frozen:
    /// completing it again is a no-op.
    pub fn complete(&mut self, final_answer: impl Into<String>, reason: StopReason) {
        if self.is_completed {
            tracing::debug!(execution_id = %self.execution_id, "Scratchpad already completed");
            return;
        }
        self.final_answer = Some(final_answer.into());
        self.stop_reason = Some(reason);
        self.is_completed = true;
        self.completed_at = Some(Utc::now());
    }

    pub fn last_thought(&self) -> Option<&Thought> {
        self.thoughts.last()
    }

    pub fn last_action(&self) -> Option<&Action> {
        self.actions.last()
    }

    pub fn last_observation(&self) -> Option<&Observation> {
        self.observations.last()
    }

    pub fn successful_observations(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter().filter(|o| o.is_success)
    }

    /// Wall-clock time so far, or total time once completed.
    pub fn execution_time(&self) -> Duration {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.started_at).to_std().unwrap_or_default()
    }

    /// Render the history as protocol lines for the next prompt.
    pub fn format_for_llm(&self) -> String {
        self.format_for_llm_with(|observation| format!("Observation: {}", observation.content))
    }

    /// Like [`Scratchpad::format_for_llm`], with observation lines rendered
    /// by `observation_line`.
    pub fn format_for_llm_with(&self, observation_line: impl Fn(&Observation) -> String) -> String {
        let steps: BTreeSet<u32> = self
            .thoughts
            .iter()
            .map(|t| t.step_number)
            .chain(self.actions.iter().map(|a| a.step_number))
            .chain(self.observations.iter().map(|o| o.step_number))
            .collect();

        let mut lines = Vec::new();
        for step in steps {
            for thought in self.thoughts.iter().filter(|t| t.step_number == step) {
                lines.push(format!("Thought: {}", thought.content));
            }
            for action in self.actions.iter().filter(|a| a.step_number == step) {
                if action.is_final_answer {
                    lines.push(format!(
                        "Final Answer: {}",
                        action.final_answer.as_deref().unwrap_or_default()
                    ));
                } else if !action.tool_name.is_empty() {
                    lines.push(format!("Action: {}", action.tool_name));
                    if !action.parameters.is_empty() {
                        lines.push(format!(
                            "Action Input: {}",
                            parameters_to_json(&action.parameters)
                        ));
                    }
                }
            }
            for observation in self.observations.iter().filter(|o| o.step_number == step) {
                lines.push(observation_line(observation));
            }
        }
        lines.join("\n")
    }

    /// One-line status, e.g. `Scratchpad[abc]: Completed - 3 steps in 00:04`.
    pub fn status_summary(&self) -> String {
        let status = if self.is_completed { "Completed" } else { "In Progress" };
        let secs = self.execution_time().as_secs();
        format!(
            "Scratchpad[{}]: {} - {} steps in {:02}:{:02}",
            self.execution_id,
            status,
            self.current_step,
            secs / 60,
            secs % 60
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ParamValue;

    fn search_action() -> Action {
        let mut action = Action::new();
        action.tool_id = "web_search".into();
        action.tool_name = "web_search".into();
        action
            .parameters
            .insert("query".into(), ParamValue::from("weather Prague"));
        action
    }

    #[test]
    fn requires_tool_only_for_non_final_with_id() {
        assert!(search_action().requires_tool());
        assert!(!Action::final_answer("done").requires_tool());
        assert!(!Action::new().requires_tool());
    }

    #[test]
    fn appends_stamp_step_and_execution() {
        let mut pad = Scratchpad::new("exec-1", "question");
        pad.add_thought(Thought::new("first")).unwrap();
        pad.complete_step();
        let action = pad.add_action(search_action()).unwrap();
        assert_eq!(action.step_number, 1);
        assert_eq!(action.execution_id, "exec-1");
        assert_eq!(pad.thoughts[0].step_number, 0);
    }

    #[test]
    fn complete_is_frozen_after_first_call() {
        let mut pad = Scratchpad::new("exec-1", "q");
        pad.complete("first", StopReason::FinalAnswer);
        pad.complete("second", StopReason::Cancelled);
        assert!(pad.is_completed);
        assert_eq!(pad.final_answer.as_deref(), Some("first"));
        assert_eq!(pad.stop_reason, Some(StopReason::FinalAnswer));
        assert!(pad.completed_at.is_some());
    }

    #[test]
    fn transcript_groups_by_step() {
        let mut pad = Scratchpad::new("exec-1", "weather?");
        pad.add_thought(Thought::new("I need the forecast")).unwrap();
        pad.add_action(search_action()).unwrap();
        pad.add_observation(Observation::success("web_search", "web_search", "Sunny, 20C"))
            .unwrap();
        pad.complete_step();
        pad.add_thought(Thought::new("I know it now")).unwrap();
        pad.add_action(Action::final_answer("Sunny")).unwrap();

        let text = pad.format_for_llm();
        assert_eq!(
            text,
            "Thought: I need the forecast\n\
             Action: web_search\n\
             Action Input: {\"query\":\"weather Prague\"}\n\
             Observation: Sunny, 20C\n\
             Thought: I know it now\n\
             Final Answer: Sunny"
        );
    }

    #[test]
    fn completed_scratchpad_refuses_entries() {
        let mut pad = Scratchpad::new("exec-1", "q");
        pad.add_thought(Thought::new("done thinking")).unwrap();
        pad.complete_step();
        pad.complete("answer", StopReason::FinalAnswer);

        assert!(matches!(
            pad.add_thought(Thought::new("late")),
            Err(Error::AlreadyCompleted(id)) if id == "exec-1"
        ));
        assert!(pad.add_action(Action::new()).is_err());
        assert!(pad.add_observation(Observation::success("t", "t", "late")).is_err());
        pad.complete_step();

        assert_eq!(pad.thoughts.len(), 1);
        assert!(pad.actions.is_empty());
        assert!(pad.observations.is_empty());
        assert_eq!(pad.current_step, 1);
    }

    #[test]
    fn observation_lines_can_be_customized() {
        let mut pad = Scratchpad::new("exec-1", "q");
        pad.add_thought(Thought::new("look it up")).unwrap();
        pad.add_action(search_action()).unwrap();
        pad.add_observation(Observation::success("web_search", "web_search", "Sunny"))
            .unwrap();

        let text = pad.format_for_llm_with(|o| format!("Observation: {} [checked]", o.content));
        assert!(text.ends_with("Observation: Sunny [checked]"));
        assert!(pad.format_for_llm().ends_with("Observation: Sunny"));
    }

    #[test]
    fn status_summary_format() {
        let mut pad = Scratchpad::new("abc", "q");
        pad.complete_step();
        assert!(pad.status_summary().starts_with("Scratchpad[abc]: In Progress - 1 steps in 00:0"));
        pad.complete("x", StopReason::FinalAnswer);
        assert!(pad.status_summary().contains("Completed"));
    }

    #[test]
    fn failure_observation_has_error() {
        let obs = Observation::failure(
            "x",
            "x",
            ObservationErrorKind::Timeout,
            "Timeout",
            "Tool x timed out",
        );
        assert!(obs.has_error());
        assert_eq!(obs.relevance, 0.0);
        assert!(!Observation::success("x", "x", "ok").has_error());
    }
}
