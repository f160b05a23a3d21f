//! Thought generation.
//!
//! Builds the prompt for the current step, asks the completion backend for
//! the next piece of reasoning and scores what comes back. Validation,
//! bounded retries and the fallback thought live here too, so the loop
//! always gets a thought to work with.

use chrono::Utc;
use reagent_core::completion::{CompletionOptions, TextCompletion};
use reagent_core::context::ExecutionContext;
use reagent_core::error::{CompletionError, Error};
use reagent_core::scratchpad::{Scratchpad, Thought};
use reagent_core::tool::{ToolDescriptor, ToolRegistry};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::observation::ObservationProcessor;
use crate::parser::OutputParser;
use crate::prompt::{PromptTemplate, fill, format_tool_catalog};
use crate::retry::{RetryPolicy, sleep_or_cancel};

/// Words that suggest the model is actually reasoning.
const REASONING_KEYWORDS: &[&str] = &[
    "proto", "protože", "musím", "potřebuji", "zjistit", "because", "need", "must", "should",
];

/// Stop sequences for thought generation. The model must not invent tool
/// results or the next user turn.
const STOP_SEQUENCES: &[&str] = &["Observation:", "Human:"];

pub struct ThoughtGenerator {
    completion: Arc<dyn TextCompletion>,
    registry: Arc<dyn ToolRegistry>,
    parser: OutputParser,
    template: PromptTemplate,
    observations: ObservationProcessor,
    model_id: String,
    options: CompletionOptions,
    refine_options: CompletionOptions,
}

impl ThoughtGenerator {
    pub fn new(
        completion: Arc<dyn TextCompletion>,
        registry: Arc<dyn ToolRegistry>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            completion,
            registry,
            parser: OutputParser::default(),
            template: PromptTemplate::default(),
            observations: ObservationProcessor::default(),
            model_id: model_id.into(),
            options: CompletionOptions::new(0.7, 500).with_stop(STOP_SEQUENCES),
            refine_options: CompletionOptions::new(0.5, 400),
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.observations = ObservationProcessor::new(template.language);
        self.template = template;
        self
    }

    pub fn with_parser(mut self, parser: OutputParser) -> Self {
        self.parser = parser;
        self
    }

    /// Sampling for thought generation. Stop sequences are kept.
    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.options.temperature = temperature;
        self.options.max_tokens = max_tokens;
        self
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Ask the model for the next thought.
    ///
    /// The call is bounded by whatever is left of the execution timeout.
    pub async fn generate(
        &self,
        input: &str,
        scratchpad: &Scratchpad,
        context: &ExecutionContext,
        cancel: CancellationToken,
    ) -> Result<Thought, CompletionError> {
        let tools = self.registry.list_enabled_tools().await;
        let catalog = format_tool_catalog(&tools, self.template.phrases());
        let prompt = self.template.thought_prompt(
            input,
            &catalog,
            &scratchpad.format_for_llm_with(|o| self.observations.format_for_llm(o)),
            scratchpad.current_step,
        );

        debug!(
            execution_id = %context.execution_id,
            step = scratchpad.current_step,
            prompt_len = prompt.len(),
            "Requesting thought"
        );

        let model_id = context.model_id.as_deref().unwrap_or(&self.model_id);
        let call = self.completion.complete(
            model_id,
            &prompt,
            context.conversation_id.as_deref(),
            &self.options,
            cancel,
        );
        let raw = match remaining_time(context) {
            Some(remaining) => tokio::time::timeout(remaining, call).await.map_err(|_| {
                CompletionError::Timeout(format!(
                    "no completion within the remaining {}s of the execution",
                    remaining.as_secs()
                ))
            })??,
            None => call.await?,
        };

        let mut thought = self.interpret(&raw, &tools);
        thought.step_number = scratchpad.current_step;
        thought.execution_id = scratchpad.execution_id.clone();

        info!(
            execution_id = %context.execution_id,
            step = thought.step_number,
            confidence = thought.confidence,
            action_required = thought.is_action_required,
            "Generated thought"
        );
        Ok(thought)
    }

    /// Generate with bounded retries.
    ///
    /// An invalid thought is retried while attempts remain and then used
    /// as-is. If every attempt fails outright, a fallback thought is
    /// returned. The only error is [`Error::Cancelled`].
    pub async fn generate_with_retry(
        &self,
        input: &str,
        scratchpad: &Scratchpad,
        context: &ExecutionContext,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Result<Thought, Error> {
        let mut last_invalid = None;
        let mut last_error = None;
        let deadline = remaining_time(context).map(|left| Instant::now() + left);
        let budget_spent = || deadline.is_some_and(|d| Instant::now() >= d);

        for attempt in 0..policy.attempts() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if attempt > 0 && budget_spent() {
                debug!(execution_id = %context.execution_id, attempt, "Execution time spent, no further attempts");
                break;
            }

            match self.generate(input, scratchpad, context, cancel.clone()).await {
                Ok(thought) if self.is_thought_valid(&thought) => return Ok(thought),
                Ok(thought) => {
                    warn!(
                        execution_id = %context.execution_id,
                        attempt,
                        preview = %thought.raw_output.chars().take(100).collect::<String>(),
                        "Generated thought is not valid"
                    );
                    last_invalid = Some(thought);
                    if policy.has_retry_after(attempt) {
                        sleep_or_cancel(bounded_delay(policy.invalid_delay, deadline), &cancel)
                            .await
                            .map_err(|_| Error::Cancelled)?;
                    }
                }
                Err(CompletionError::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    if cancel.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    warn!(
                        execution_id = %context.execution_id,
                        attempt,
                        error = %e,
                        "Thought generation failed"
                    );
                    last_error = Some(e);
                    if budget_spent() {
                        break;
                    }
                    if policy.has_retry_after(attempt) {
                        sleep_or_cancel(bounded_delay(policy.error_delay, deadline), &cancel)
                            .await
                            .map_err(|_| Error::Cancelled)?;
                    }
                }
            }
        }

        if let Some(thought) = last_invalid {
            return Ok(thought);
        }
        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        let mut thought = self.fallback(input, &reason);
        thought.step_number = scratchpad.current_step;
        thought.execution_id = scratchpad.execution_id.clone();
        Ok(thought)
    }

    /// Thought used when the model could not be reached at all.
    pub fn fallback(&self, input: &str, reason: &str) -> Thought {
        let content = fill(self.template.phrases().fallback_thought, &[("input", input)]);
        let mut thought = Thought::new(content.clone());
        thought.raw_output = format!("Thought: {content}");
        thought.confidence = 0.1;
        thought.is_action_required = true;
        thought.metadata.insert("fallback".into(), json!(true));
        thought.metadata.insert("error".into(), json!(reason));
        warn!(reason, "Using fallback thought");
        thought
    }

    /// Ask the model to improve `thought` along `hint`.
    ///
    /// On failure the original thought is returned unchanged.
    pub async fn refine(
        &self,
        thought: &Thought,
        hint: &str,
        context: &ExecutionContext,
        cancel: CancellationToken,
    ) -> Thought {
        let phrases = self.template.phrases();
        let prompt = fill(
            phrases.refine_prompt,
            &[("thought", &thought.content), ("hint", hint)],
        );
        let model_id = context.model_id.as_deref().unwrap_or(&self.model_id);

        match self
            .completion
            .complete(
                model_id,
                &prompt,
                context.conversation_id.as_deref(),
                &self.refine_options,
                cancel,
            )
            .await
        {
            Ok(raw) if !raw.trim().is_empty() => {
                let tools = self.registry.list_enabled_tools().await;
                let mut refined = self.interpret(&raw, &tools);
                refined.step_number = thought.step_number;
                refined.execution_id = thought.execution_id.clone();
                refined.reasoning = fill(phrases.refined_reasoning, &[("original", &thought.content)]);
                refined.metadata.insert("refined_from".into(), json!(thought.id));
                refined.created_at = Utc::now();
                debug!(step = thought.step_number, "Refined thought");
                refined
            }
            Ok(_) => {
                warn!(step = thought.step_number, "Refinement returned nothing, keeping original");
                thought.clone()
            }
            Err(e) => {
                warn!(step = thought.step_number, error = %e, "Refinement failed, keeping original");
                thought.clone()
            }
        }
    }

    /// Usable thought: non-empty, at least 10 characters, in protocol
    /// format and not going in circles. Checked on the full model output.
    pub fn is_thought_valid(&self, thought: &Thought) -> bool {
        let raw = thought.raw_output.trim();
        if raw.is_empty() || raw.chars().count() < 10 {
            return false;
        }
        if !self.parser.is_valid_format(raw) {
            return false;
        }
        !has_circular_reasoning(raw)
    }

    /// Heuristic confidence in `[0, 1]`.
    pub fn confidence(&self, thought: &Thought, tools: &[ToolDescriptor]) -> f64 {
        let mut confidence: f64 = 0.5;

        let len = thought.content.chars().count();
        if len > 50 && len < 300 {
            confidence += 0.2;
        } else if len > 300 {
            confidence += 0.1;
        }

        let lower = thought.content.to_lowercase();
        let keywords = REASONING_KEYWORDS.iter().filter(|k| lower.contains(*k)).count();
        confidence += (keywords as f64 * 0.05).min(0.2);

        if thought.is_action_required && thought.suggested_action.is_some() {
            confidence += 0.1;
        }

        if self.parser.is_valid_format(&thought.raw_output) {
            confidence += 0.1;
        }

        let raw_lower = thought.raw_output.to_lowercase();
        if tools.iter().any(|t| {
            raw_lower.contains(&t.name.to_lowercase()) || raw_lower.contains(&t.id.to_lowercase())
        }) {
            confidence += 0.1;
        }

        confidence.clamp(0.0, 1.0)
    }

    fn interpret(&self, raw: &str, tools: &[ToolDescriptor]) -> Thought {
        let parsed = self.parser.parse(raw);
        let content = parsed.thought.clone().unwrap_or_else(|| raw.trim().to_string());

        let mut thought = Thought::new(content);
        thought.raw_output = raw.to_string();
        thought.is_action_required = !parsed.is_final_answer && parsed.has_action();
        if thought.is_action_required {
            thought.suggested_action = parsed.action.clone();
        }
        if !parsed.is_valid {
            thought
                .metadata
                .insert("parsing_error".into(), json!(parsed.error_message));
        }
        thought.confidence = self.confidence(&thought, tools);
        thought
    }
}

/// Over half of the first-half words reappear in the second half.
/// Texts under five words are never circular.
pub fn has_circular_reasoning(text: &str) -> bool {
    let words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    if words.len() < 5 {
        return false;
    }
    let (first, second) = words.split_at(words.len() / 2);
    let second: HashSet<&str> = second.iter().map(String::as_str).collect();
    let repeated = first.iter().filter(|w| second.contains(w.as_str())).count();
    repeated as f64 / first.len() as f64 > 0.5
}

/// Time left before the execution timeout, if there is one.
pub(crate) fn remaining_time(context: &ExecutionContext) -> Option<Duration> {
    let timeout = context.execution_timeout?;
    let elapsed = (Utc::now() - context.started_at).to_std().unwrap_or_default();
    Some(timeout.saturating_sub(elapsed))
}

/// A retry delay never sleeps past the execution deadline.
fn bounded_delay(delay: Duration, deadline: Option<Instant>) -> Duration {
    match deadline {
        Some(d) => delay.min(d.saturating_duration_since(Instant::now())),
        None => delay,
    }
}
