//! ReAct loop: Thought → Action → Observation until an answer or a limit.
//!
//! Each iteration asks the model for a thought, builds the action it
//! describes and, when that action names a tool, runs it and records the
//! observation. Everything lands in the execution's [`Scratchpad`], in order,
//! and is mirrored to [`AgentMemory`] when one is attached.
//!
//! After every iteration the loop stops if:
//!
//! 1. the scratchpad was completed with a final answer,
//! 2. the iteration limit was reached,
//! 3. the execution timeout elapsed, or
//! 4. the last three actions all failed.
//!
//! Stopping without a final answer summarizes whatever the successful
//! observations found. Cancellation ends the run at the next suspension
//! point. No tool or model failure escapes [`ReactAgent::run`]: the returned
//! scratchpad is always completed and always has a final answer.

use chrono::Utc;
use reagent_config::AppConfig;
use reagent_core::completion::{CompletionOptions, TextCompletion};
use reagent_core::context::ExecutionContext;
use reagent_core::error::{CompletionError, Error, MemoryError};
use reagent_core::event::{AgentEvent, EventBus, preview};
use reagent_core::scratchpad::{Scratchpad, StopReason};
use reagent_core::tool::{ToolExecutor, ToolRegistry};
use reagent_memory::{AgentMemory, DEFAULT_SIMILARITY_THRESHOLD};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::action_builder::ActionBuilder;
use crate::executor::ActionExecutor;
use crate::observation::ObservationProcessor;
use crate::prompt::{Language, PromptTemplate, fill};
use crate::retry::RetryPolicy;
use crate::thought::ThoughtGenerator;

/// Iteration limits accepted from configuration or context metadata.
pub const MIN_ITERATIONS: u32 = 1;
pub const MAX_ITERATIONS: u32 = 10;
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Consecutive failed tool actions that abort the run.
const FAILURE_STREAK: usize = 3;

pub struct ReactAgent {
    completion: Arc<dyn TextCompletion>,
    thoughts: ThoughtGenerator,
    actions: ActionBuilder,
    executor: ActionExecutor,
    memory: Option<Arc<AgentMemory>>,
    event_bus: Arc<EventBus>,
    language: Language,
    max_iterations: u32,
    execution_timeout: Option<Duration>,
    retry: RetryPolicy,
    summary_options: CompletionOptions,
    similarity_window: usize,
}

impl ReactAgent {
    pub fn new(
        completion: Arc<dyn TextCompletion>,
        registry: Arc<dyn ToolRegistry>,
        tools: Arc<dyn ToolExecutor>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            thoughts: ThoughtGenerator::new(completion.clone(), registry.clone(), model_id),
            completion,
            actions: ActionBuilder::default(),
            executor: ActionExecutor::new(registry, tools),
            memory: None,
            event_bus: Arc::new(EventBus::default()),
            language: Language::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            execution_timeout: None,
            retry: RetryPolicy::default(),
            summary_options: CompletionOptions::new(0.3, 300),
            similarity_window: 10,
        }
    }

    /// Build an agent with every knob taken from configuration.
    pub fn from_config(
        config: &AppConfig,
        completion: Arc<dyn TextCompletion>,
        registry: Arc<dyn ToolRegistry>,
        tools: Arc<dyn ToolExecutor>,
    ) -> Self {
        let agent = &config.agent;
        let mut react = Self::new(completion, registry, tools, config.completion.model.clone())
            .with_language(Language::from_code(&agent.language))
            .with_max_iterations(agent.max_iterations)
            .with_tool_timeout(agent.tool_timeout())
            .with_retry_policy(RetryPolicy::from_settings(agent));
        react.thoughts = react
            .thoughts
            .with_sampling(config.completion.temperature, config.completion.max_tokens);
        react.summary_options = CompletionOptions::new(
            config.completion.summary_temperature,
            config.completion.summary_max_tokens,
        );
        react.execution_timeout = agent.execution_timeout();
        react.similarity_window = config.memory.similarity_window;
        react
    }

    /// Use prompts, labels and messages for `language`.
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self.thoughts = self.thoughts.with_template(PromptTemplate::for_language(language));
        self.executor = self
            .executor
            .with_processor(ObservationProcessor::new(language));
        self
    }

    /// Replace the prompt template. Its language drives messages too.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self = self.with_language(template.language);
        self.thoughts = self.thoughts.with_template(template);
        self
    }

    /// Clamped to `1..=10`.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.clamp(MIN_ITERATIONS, MAX_ITERATIONS);
        self
    }

    /// Applies when the execution context carries no timeout of its own.
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.executor = self.executor.with_timeout(timeout);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_memory(mut self, memory: Arc<AgentMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Iteration limit for this context: the `react_max_iterations`
    /// metadata value when present, else the configured limit.
    pub fn max_iterations_for(&self, context: &ExecutionContext) -> u32 {
        match context.max_iterations_override() {
            Some(value) => value.clamp(MIN_ITERATIONS as i64, MAX_ITERATIONS as i64) as u32,
            None => self.max_iterations,
        }
    }

    /// Run one execution to completion.
    pub async fn run(
        &self,
        input: &str,
        mut context: ExecutionContext,
        cancel: CancellationToken,
    ) -> Scratchpad {
        if context.execution_timeout.is_none() {
            context.execution_timeout = self.execution_timeout;
        }
        let max_iterations = self.max_iterations_for(&context);
        let mut scratchpad = Scratchpad::new(&context.execution_id, input);

        info!(
            execution_id = %context.execution_id,
            max_iterations,
            input = %preview(input, 100),
            "Starting ReAct execution"
        );
        self.event_bus.publish(AgentEvent::ExecutionStarted {
            execution_id: context.execution_id.clone(),
            input_preview: preview(input, 100),
            max_iterations,
            timestamp: Utc::now(),
        });
        if let Some(memory) = &self.memory {
            log_memory_error(memory.begin_execution(&scratchpad).await, "execution start");
        }

        let phrases = self.language.phrases();
        match self
            .iterate(input, &context, &mut scratchpad, max_iterations, &cancel)
            .await
        {
            Ok(()) => {}
            Err(Error::Cancelled) => {
                info!(execution_id = %context.execution_id, step = scratchpad.current_step, "Execution cancelled");
                scratchpad.complete(phrases.cancelled, StopReason::Cancelled);
            }
            Err(e @ Error::AlreadyCompleted(_)) => {
                // The recorded outcome stands; the late entry is dropped.
                warn!(execution_id = %context.execution_id, error = %e, "Entry refused by completed scratchpad");
            }
        }

        if let Some(memory) = &self.memory {
            log_memory_error(memory.record_completion(&scratchpad).await, "execution completion");
        }

        // Every arm above leaves the scratchpad completed.
        let reason = scratchpad.stop_reason.unwrap_or(StopReason::Cancelled);
        let duration = scratchpad.execution_time();
        info!(
            execution_id = %context.execution_id,
            steps = scratchpad.current_step,
            reason = %reason,
            duration_ms = duration.as_millis() as u64,
            "ReAct execution finished"
        );
        self.event_bus.publish(AgentEvent::ExecutionCompleted {
            execution_id: context.execution_id.clone(),
            steps: scratchpad.current_step,
            reason,
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        });
        scratchpad
    }

    async fn iterate(
        &self,
        input: &str,
        context: &ExecutionContext,
        scratchpad: &mut Scratchpad,
        max_iterations: u32,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            self.step(input, context, scratchpad, cancel).await?;

            if let Some(reason) = self.stop_reason(scratchpad, context, max_iterations) {
                if reason != StopReason::FinalAnswer {
                    info!(
                        execution_id = %context.execution_id,
                        step = scratchpad.current_step,
                        reason = %reason,
                        "Stopping without a final answer"
                    );
                    let answer = self.summarize(input, context, scratchpad, cancel).await?;
                    scratchpad.complete(answer, reason);
                }
                return Ok(());
            }
        }
    }

    /// One Thought → Action → Observation round.
    async fn step(
        &self,
        input: &str,
        context: &ExecutionContext,
        scratchpad: &mut Scratchpad,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        // ── Thought ──
        let mut thought = self
            .thoughts
            .generate_with_retry(input, scratchpad, context, self.retry, cancel.clone())
            .await?;

        if let Some(memory) = &self.memory {
            if memory
                .has_similar_thought(&thought.content, DEFAULT_SIMILARITY_THRESHOLD, self.similarity_window)
                .await
            {
                warn!(
                    execution_id = %context.execution_id,
                    step = scratchpad.current_step,
                    "Thought repeats a recent one"
                );
                thought.metadata.insert("similar_to_recent".into(), json!(true));
            }
        }

        let thought = scratchpad.add_thought(thought)?.clone();
        self.event_bus.publish(AgentEvent::ThoughtGenerated {
            execution_id: context.execution_id.clone(),
            step: thought.step_number,
            confidence: thought.confidence,
            content_preview: preview(&thought.content, 100),
            timestamp: Utc::now(),
        });
        if let Some(memory) = &self.memory {
            log_memory_error(memory.store_thought(&thought).await, "thought");
        }

        // ── Action ──
        let action = self.actions.build_action(&thought);
        let action = scratchpad.add_action(action)?.clone();
        if let Some(memory) = &self.memory {
            log_memory_error(memory.store_action(&action).await, "action");
        }

        if action.is_final_answer {
            let answer = action.final_answer.clone().unwrap_or_default();
            info!(
                execution_id = %context.execution_id,
                step = action.step_number,
                "Final answer reached"
            );
            scratchpad.complete_step();
            scratchpad.complete(answer, StopReason::FinalAnswer);
            return Ok(());
        }

        if action.requires_tool() {
            // ── Observation ──
            self.event_bus.publish(AgentEvent::ActionStarted {
                execution_id: context.execution_id.clone(),
                step: action.step_number,
                tool_id: action.tool_id.clone(),
                timestamp: Utc::now(),
            });

            let mut observation = self.executor.execute(&action, context, cancel.clone()).await;
            let useful = self.executor.processor().is_useful(&observation, Some(input));
            if observation.is_success && !useful {
                warn!(
                    execution_id = %context.execution_id,
                    step = action.step_number,
                    tool = %action.tool_id,
                    "Observation looks unhelpful for the question"
                );
            }
            observation.metadata.insert("is_useful".into(), json!(useful));
            let observation = scratchpad.add_observation(observation)?.clone();
            self.event_bus.publish(AgentEvent::ObservationReceived {
                execution_id: context.execution_id.clone(),
                step: observation.step_number,
                tool_id: observation.tool_id.clone(),
                success: observation.is_success,
                duration_ms: observation.execution_time.as_millis() as u64,
                timestamp: Utc::now(),
            });
            if let Some(memory) = &self.memory {
                log_memory_error(memory.store_observation(&observation).await, "observation");
            }

            if cancel.is_cancelled() {
                scratchpad.complete_step();
                return Err(Error::Cancelled);
            }
        } else {
            debug!(
                execution_id = %context.execution_id,
                step = scratchpad.current_step,
                "Reasoning step without action"
            );
        }

        scratchpad.complete_step();
        Ok(())
    }

    /// Why the loop should stop now, if it should.
    fn stop_reason(
        &self,
        scratchpad: &Scratchpad,
        context: &ExecutionContext,
        max_iterations: u32,
    ) -> Option<StopReason> {
        if scratchpad.is_completed {
            return Some(scratchpad.stop_reason.unwrap_or(StopReason::FinalAnswer));
        }
        if scratchpad.current_step >= max_iterations {
            debug!(execution_id = %context.execution_id, max_iterations, "Iteration limit reached");
            return Some(StopReason::MaxIterations);
        }
        if let Some(timeout) = context.execution_timeout {
            if scratchpad.execution_time() > timeout {
                warn!(
                    execution_id = %context.execution_id,
                    timeout_secs = timeout.as_secs(),
                    "Execution timeout elapsed"
                );
                return Some(StopReason::ExecutionTimeout);
            }
        }
        if has_failure_streak(scratchpad) {
            warn!(execution_id = %context.execution_id, "Repeated tool failures, giving up");
            return Some(StopReason::RepeatedFailures);
        }
        None
    }

    /// Best answer available without a final answer from the model.
    async fn summarize(
        &self,
        input: &str,
        context: &ExecutionContext,
        scratchpad: &Scratchpad,
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        let phrases = self.language.phrases();
        let findings: Vec<&str> = scratchpad
            .successful_observations()
            .map(|o| o.content.as_str())
            .filter(|c| !c.trim().is_empty())
            .collect();

        if findings.is_empty() {
            return Ok(phrases.no_answer.to_string());
        }

        let listing = findings
            .iter()
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = fill(phrases.summary_prompt, &[("input", input), ("observations", &listing)]);
        let model_id = context.model_id.as_deref().unwrap_or(self.thoughts.model_id());
        // Fresh conversation: the summary must not see the ReAct transcript.
        let conversation_id = uuid::Uuid::new_v4().to_string();

        match self
            .completion
            .complete(
                model_id,
                &prompt,
                Some(&conversation_id),
                &self.summary_options,
                cancel.clone(),
            )
            .await
        {
            Ok(summary) if !summary.trim().is_empty() => {
                debug!(execution_id = %context.execution_id, "Summarized observations");
                Ok(summary.trim().to_string())
            }
            Err(CompletionError::Cancelled) => Err(Error::Cancelled),
            Err(_) if cancel.is_cancelled() => Err(Error::Cancelled),
            other => {
                if let Err(e) = other {
                    warn!(execution_id = %context.execution_id, error = %e, "Summary failed");
                }
                Ok(fill(phrases.summary_fallback, &[("observations", &findings.join(" "))]))
            }
        }
    }
}

/// The last three actions were tool calls and all of them failed.
fn has_failure_streak(scratchpad: &Scratchpad) -> bool {
    if scratchpad.actions.len() < FAILURE_STREAK || scratchpad.observations.len() < FAILURE_STREAK {
        return false;
    }
    let actions_failed = scratchpad
        .actions
        .iter()
        .rev()
        .take(FAILURE_STREAK)
        .all(|a| !a.is_final_answer);
    let observations_failed = scratchpad
        .observations
        .iter()
        .rev()
        .take(FAILURE_STREAK)
        .all(|o| !o.is_success);
    actions_failed && observations_failed
}

fn log_memory_error(result: Result<(), MemoryError>, what: &str) {
    if let Err(e) = result {
        warn!(error = %e, "Failed to store {what} in memory");
    }
}
