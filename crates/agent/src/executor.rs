//! Action execution: validate, repair, invoke, observe.
//!
//! [`ActionExecutor::execute`] never fails. Every outcome, including an
//! unknown tool, a missing parameter, a timeout or cancellation, comes back
//! as an [`Observation`] the loop can record and show to the model.

use reagent_core::context::ExecutionContext;
use reagent_core::error::ToolError;
use reagent_core::scratchpad::{Action, Observation};
use reagent_core::tool::{ToolDescriptor, ToolExecutionContext, ToolExecutor, ToolRegistry};
use reagent_core::value::Parameters;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::observation::ObservationProcessor;
use crate::prompt::fill;

/// Default hard limit for a single tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Names a model commonly uses instead of the declared parameter.
const PARAMETER_ALIASES: &[(&str, &[&str])] = &[
    ("query", &["input", "search", "text", "question"]),
    ("input", &["query", "text", "prompt", "content"]),
    ("text", &["input", "query", "content", "prompt"]),
    ("url", &["link", "address", "uri"]),
    ("file", &["path", "filename", "filepath"]),
];

pub struct ActionExecutor {
    registry: Arc<dyn ToolRegistry>,
    tools: Arc<dyn ToolExecutor>,
    processor: ObservationProcessor,
    tool_timeout: Duration,
}

impl ActionExecutor {
    pub fn new(registry: Arc<dyn ToolRegistry>, tools: Arc<dyn ToolExecutor>) -> Self {
        Self {
            registry,
            tools,
            processor: ObservationProcessor::default(),
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_processor(mut self, processor: ObservationProcessor) -> Self {
        self.processor = processor;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn processor(&self) -> &ObservationProcessor {
        &self.processor
    }

    pub fn tool_timeout(&self) -> Duration {
        self.tool_timeout
    }

    /// Whether the action names a registered, enabled tool.
    pub async fn can_execute(&self, action: &Action) -> bool {
        self.resolve(action).await.is_ok()
    }

    /// Run the action's tool and turn the outcome into an observation.
    pub async fn execute(
        &self,
        action: &Action,
        context: &ExecutionContext,
        cancel: CancellationToken,
    ) -> Observation {
        let formatter = self.processor.formatter();

        let descriptor = match self.resolve(action).await {
            Ok(descriptor) => descriptor,
            Err(reason) => {
                warn!(
                    execution_id = %context.execution_id,
                    tool = %action.tool_id,
                    reason = %reason,
                    "Action cannot be executed"
                );
                return self.processor.enrich(formatter.unavailable(action, &reason), context);
            }
        };

        let mut parameters = action.parameters.clone();
        if let Err(missing) = repair_parameters(&descriptor, &mut parameters) {
            warn!(tool = %action.tool_id, param = %missing, "Required parameter missing");
            return self
                .processor
                .enrich(formatter.missing_parameter(action, &missing), context);
        }

        info!(
            execution_id = %context.execution_id,
            step = action.step_number,
            tool = %action.tool_id,
            params = parameters.len(),
            "Executing tool"
        );

        let tool_context = self.tool_context(action, context);
        let started = Instant::now();
        let call = self
            .tools
            .execute(&action.tool_id, parameters, tool_context, cancel.clone());

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let error = ToolError::Cancelled(action.tool_id.clone());
                return self.processor.process_error(&error, action, context);
            }
            outcome = tokio::time::timeout(self.tool_timeout, call) => outcome,
        };
        let elapsed = started.elapsed();

        match outcome {
            Err(_) => {
                warn!(
                    execution_id = %context.execution_id,
                    tool = %action.tool_id,
                    timeout_secs = self.tool_timeout.as_secs(),
                    "Tool timed out"
                );
                self.processor
                    .enrich(formatter.timed_out(action, self.tool_timeout), context)
            }
            Ok(Err(error)) => self.processor.process_error(&error, action, context),
            Ok(Ok(result)) => match result.error.as_ref().filter(|_| !result.is_success) {
                Some(error) => {
                    debug!(tool = %action.tool_id, error = %error, "Tool reported failure");
                    self.processor.process_error(error, action, context)
                }
                None => {
                    debug!(
                        tool = %action.tool_id,
                        elapsed_ms = elapsed.as_millis() as u64,
                        success = result.is_success,
                        "Tool finished"
                    );
                    self.processor.process_result(&result, action, context, elapsed)
                }
            },
        }
    }

    /// Descriptor for the action's tool, or a reason it cannot run.
    async fn resolve(&self, action: &Action) -> Result<ToolDescriptor, String> {
        let phrases = self.processor.formatter().phrases();
        let name = action.tool_id.as_str();

        if name.is_empty() {
            return Err(fill(phrases.no_tool_specified, &[("name", &action.tool_name)]));
        }
        if !self.registry.is_registered(name).await {
            return Err(fill(phrases.not_registered, &[("name", name)]));
        }
        let descriptor = match self.registry.get_tool(name).await {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => return Err(fill(phrases.not_registered, &[("name", name)])),
            Err(e) => return Err(e.to_string()),
        };
        if !self.registry.is_enabled(name).await {
            return Err(fill(phrases.disabled, &[("name", name)]));
        }
        Ok(descriptor)
    }

    fn tool_context(&self, action: &Action, context: &ExecutionContext) -> ToolExecutionContext {
        let mut tool_context = ToolExecutionContext {
            user_id: context.user_id.clone(),
            session_id: context.session_id.clone(),
            conversation_id: context.conversation_id.clone(),
            timeout: self.tool_timeout,
            ..Default::default()
        };
        tool_context
            .custom
            .insert("react_execution_id".into(), json!(context.execution_id));
        tool_context
            .custom
            .insert("react_step_number".into(), json!(action.step_number));
        tool_context
            .custom
            .insert("react_reasoning".into(), json!(action.reasoning));
        tool_context
    }
}

/// Fill in required parameters the model named differently.
///
/// Tries the alias table, then a case-insensitive key match, then the
/// parameter's default. Returns the first parameter that is still missing.
pub fn repair_parameters(descriptor: &ToolDescriptor, parameters: &mut Parameters) -> Result<(), String> {
    for param in descriptor.required_parameters() {
        let name = param.name.as_str();
        if parameters.contains_key(name) {
            continue;
        }

        let aliased = PARAMETER_ALIASES
            .iter()
            .find(|(canonical, _)| *canonical == name)
            .and_then(|(_, aliases)| aliases.iter().find_map(|alias| parameters.get(*alias)))
            .cloned();
        let case_insensitive = || {
            parameters
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.clone())
        };

        match aliased.or_else(case_insensitive).or_else(|| param.default.clone()) {
            Some(value) => {
                debug!(tool = %descriptor.id, param = %name, "Repaired missing parameter");
                parameters.insert(name.to_string(), value);
            }
            None => return Err(name.to_string()),
        }
    }
    Ok(())
}
