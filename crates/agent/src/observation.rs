//! Observations: turning tool outcomes into bounded, model-facing text.
//!
//! [`ObservationFormatter`] renders a [`ToolResult`] or a [`ToolError`]
//! into an [`Observation`] with a relevance score. [`ObservationProcessor`]
//! layers execution context on top: enrichment metadata, an adjusted
//! relevance, the usefulness check and the annotated prompt line.

use chrono::Utc;
use regex_lite::Regex;
use reagent_core::context::ExecutionContext;
use reagent_core::error::ToolError;
use reagent_core::scratchpad::{Action, Metadata, Observation, ObservationErrorKind};
use reagent_core::tool::ToolResult;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::prompt::{Language, Phrases, fill};

pub const MAX_OBSERVATION_LENGTH: usize = 2000;
pub const MAX_ERROR_LENGTH: usize = 500;
const MAX_MAP_ENTRIES: usize = 10;
const MAX_LIST_ITEMS: usize = 5;
const MAX_VALUE_LENGTH: usize = 100;

static URL_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"https?://\S+").ok());

const CZECH_MARKERS: &[&str] = &["a", "je", "v", "na", "se", "s", "že", "to", "jako", "být", "má", "pro"];
const ENGLISH_MARKERS: &[&str] = &["the", "and", "is", "in", "on", "with", "that", "it", "as", "be", "has", "for"];

/// Cut `text` to `max` characters, marking the cut with `...`.
pub fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[derive(Debug, Clone, Copy)]
pub struct ObservationFormatter {
    phrases: &'static Phrases,
}

impl ObservationFormatter {
    pub fn new(language: Language) -> Self {
        Self {
            phrases: language.phrases(),
        }
    }

    pub fn phrases(&self) -> &'static Phrases {
        self.phrases
    }

    /// Bound observation content to [`MAX_OBSERVATION_LENGTH`] characters.
    /// Already-truncated content is returned unchanged.
    pub fn truncate_content(&self, content: &str) -> String {
        let len = content.chars().count();
        if len <= MAX_OBSERVATION_LENGTH {
            return content.to_string();
        }
        let marker = self.phrases.truncated;
        if content.ends_with(marker) && len - marker.chars().count() <= MAX_OBSERVATION_LENGTH {
            return content.to_string();
        }
        let kept: String = content.chars().take(MAX_OBSERVATION_LENGTH).collect();
        debug!(original = len, "Truncated observation content");
        format!("{kept}{marker}")
    }

    /// Render a tool result.
    pub fn format(&self, result: &ToolResult, action: &Action, elapsed: Duration) -> Observation {
        let rendered = result_text(result);

        let mut observation = if result.is_success {
            let content = if rendered.is_empty() {
                self.phrases.empty_result.to_string()
            } else {
                self.truncate_content(&rendered)
            };
            let mut obs = Observation::success(&action.tool_id, &action.tool_name, content);
            obs.relevance = relevance(&rendered, result.data.is_some(), action);
            obs
        } else {
            let message = result
                .error_message()
                .unwrap_or_else(|| self.phrases.unknown_error.to_string());
            let message = truncate_text(&message, MAX_ERROR_LENGTH);
            Observation::failure(
                &action.tool_id,
                &action.tool_name,
                ObservationErrorKind::ExecutionError,
                message.clone(),
                format!("{}: {message}", self.phrases.tool_failed),
            )
        };

        observation.step_number = action.step_number;
        observation.execution_id = action.execution_id.clone();
        observation.execution_time = elapsed;
        observation.raw_data = result.data.clone();
        observation.metadata = result_metadata(result, &rendered, action);

        debug!(
            tool = %action.tool_name,
            content_len = observation.content.chars().count(),
            success = observation.is_success,
            "Formatted observation"
        );
        observation
    }

    /// Render an error raised while invoking a tool.
    pub fn format_error(&self, error: &ToolError, action: &Action) -> Observation {
        let name = action.tool_name.as_str();
        let (kind, content) = match error {
            ToolError::Timeout { .. } => (
                ObservationErrorKind::Timeout,
                fill(self.phrases.timeout, &[("name", name)]),
            ),
            ToolError::Unauthorized { .. } => (
                ObservationErrorKind::Unauthorized,
                fill(self.phrases.unauthorized, &[("name", name)]),
            ),
            ToolError::InvalidParameters { reason, .. } => (
                ObservationErrorKind::InvalidParameters,
                fill(
                    self.phrases.invalid_parameters,
                    &[("name", name), ("reason", &truncate_text(reason, MAX_ERROR_LENGTH))],
                ),
            ),
            ToolError::NotFound(_) | ToolError::Disabled(_) => (
                ObservationErrorKind::ToolUnavailable,
                fill(
                    self.phrases.cannot_execute,
                    &[("name", name), ("reason", &truncate_text(&error.to_string(), MAX_ERROR_LENGTH))],
                ),
            ),
            ToolError::Cancelled(_) => (
                ObservationErrorKind::Cancelled,
                fill(self.phrases.tool_cancelled, &[("name", name)]),
            ),
            ToolError::ExecutionFailed { reason, .. } => (
                ObservationErrorKind::ExecutionError,
                fill(
                    self.phrases.execution_error,
                    &[("name", name), ("reason", &truncate_text(reason, MAX_ERROR_LENGTH))],
                ),
            ),
        };
        self.failure(action, kind, truncate_text(&error.to_string(), MAX_ERROR_LENGTH), content)
    }

    /// The action was rejected before any tool ran.
    pub fn unavailable(&self, action: &Action, reason: &str) -> Observation {
        let message = fill(
            self.phrases.cannot_execute,
            &[("name", &action.tool_name), ("reason", &truncate_text(reason, MAX_ERROR_LENGTH))],
        );
        self.failure(action, ObservationErrorKind::ToolUnavailable, message.clone(), message)
    }

    /// A required parameter could not be found or repaired.
    pub fn missing_parameter(&self, action: &Action, param: &str) -> Observation {
        let reason = fill(
            self.phrases.missing_parameter,
            &[("param", param), ("name", &action.tool_id)],
        );
        self.format_error(
            &ToolError::InvalidParameters {
                tool_name: action.tool_id.clone(),
                reason,
            },
            action,
        )
    }

    /// The tool did not finish within the hard timeout.
    pub fn timed_out(&self, action: &Action, timeout: Duration) -> Observation {
        let content = fill(
            self.phrases.hard_timeout,
            &[("name", &action.tool_name), ("secs", &timeout.as_secs().to_string())],
        );
        let mut observation = self.failure(action, ObservationErrorKind::Timeout, "Timeout".into(), content);
        observation.execution_time = timeout;
        observation
    }

    fn failure(
        &self,
        action: &Action,
        kind: ObservationErrorKind,
        error_message: String,
        content: String,
    ) -> Observation {
        let mut observation = Observation::failure(
            &action.tool_id,
            &action.tool_name,
            kind,
            error_message,
            self.truncate_content(&content),
        );
        observation.step_number = action.step_number;
        observation.execution_id = action.execution_id.clone();
        observation
            .metadata
            .insert("error_type".into(), json!(kind.as_str()));
        observation
    }

    /// `Observation: ...` line for a prompt.
    pub fn format_for_llm(&self, observation: &Observation) -> String {
        if observation.has_error() {
            format!(
                "Observation: {} - {}",
                self.phrases.error,
                observation.error_message.as_deref().unwrap_or_default()
            )
        } else {
            format!("Observation: {}", observation.content)
        }
    }

    /// Cheap usefulness check on the observation alone.
    pub fn is_useful(&self, observation: &Observation) -> bool {
        !observation.has_error()
            && !observation.content.is_empty()
            && observation.relevance >= 0.1
            && observation.content.chars().count() >= 10
    }
}

impl Default for ObservationFormatter {
    fn default() -> Self {
        Self::new(Language::default())
    }
}

/// Summary if present, else the data rendered as text.
fn result_text(result: &ToolResult) -> String {
    match (&result.summary, &result.data) {
        (Some(summary), _) if !summary.is_empty() => summary.clone(),
        (_, Some(data)) => render_data(data),
        _ => String::new(),
    }
}

fn render_data(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .take(MAX_MAP_ENTRIES)
            .map(|(k, v)| format!("{k}: {}", render_value(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Array(items) => items
            .iter()
            .filter(|v| !v.is_null())
            .take(MAX_LIST_ITEMS)
            .map(render_value)
            .collect::<Vec<_>>()
            .join("\n"),
        other => {
            let pretty = serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string());
            truncate_text(&pretty, MAX_OBSERVATION_LENGTH)
        }
    }
}

fn render_value(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() > MAX_VALUE_LENGTH {
        let kept: String = text.chars().take(MAX_VALUE_LENGTH).collect();
        format!("{kept}...")
    } else {
        text
    }
}

/// `min(1, length + structure + keyword)`.
fn relevance(content: &str, has_data: bool, action: &Action) -> f64 {
    if content.is_empty() {
        return 0.3;
    }
    let length_score = (content.chars().count() as f64 / 500.0).min(1.0);
    let structure_score = if has_data { 0.2 } else { 0.0 };

    let keyword_score = action
        .parameters
        .get("query")
        .map(|q| q.to_string().to_lowercase())
        .filter(|q| !q.trim().is_empty())
        .map(|query| {
            let words: Vec<&str> = query.split_whitespace().collect();
            let lower = content.to_lowercase();
            let hits = words.iter().filter(|w| lower.contains(*w)).count();
            hits as f64 / words.len() as f64 * 0.5
        })
        .unwrap_or(0.0);

    (length_score + structure_score + keyword_score).min(1.0)
}

fn result_metadata(result: &ToolResult, rendered: &str, action: &Action) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("content_length".into(), json!(rendered.chars().count()));
    metadata.insert("has_data".into(), json!(result.data.is_some()));
    metadata.insert("tool_execution_success".into(), json!(result.is_success));

    let tool = action.tool_name.to_lowercase();
    if tool.contains("search") {
        metadata.insert("tool_category".into(), json!("search"));
        let query = action.parameters.get("query").map(|q| q.to_string()).unwrap_or_default();
        metadata.insert("search_query".into(), json!(query));
    } else if tool.contains("llm") {
        metadata.insert("tool_category".into(), json!("llm"));
        metadata.insert("input_length".into(), json!(action.input.chars().count()));
    }

    if let Some(data) = &result.data {
        let data_type = match data {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        };
        metadata.insert("data_type".into(), json!(data_type));
        match data {
            Value::Object(map) => {
                let keys: Vec<&String> = map.keys().take(MAX_MAP_ENTRIES).collect();
                metadata.insert("data_keys".into(), json!(keys));
            }
            Value::Array(items) => {
                metadata.insert("data_count".into(), json!(items.len()));
            }
            _ => {}
        }
    }
    metadata
}

// ── Processor ──

/// Context-aware post-processing on top of the formatter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObservationProcessor {
    formatter: ObservationFormatter,
}

impl ObservationProcessor {
    pub fn new(language: Language) -> Self {
        Self {
            formatter: ObservationFormatter::new(language),
        }
    }

    pub fn formatter(&self) -> &ObservationFormatter {
        &self.formatter
    }

    /// Format a tool result and enrich it with execution context.
    pub fn process_result(
        &self,
        result: &ToolResult,
        action: &Action,
        context: &ExecutionContext,
        elapsed: Duration,
    ) -> Observation {
        let observation = self.formatter.format(result, action, elapsed);
        self.enrich(observation, context)
    }

    pub fn process_error(&self, error: &ToolError, action: &Action, context: &ExecutionContext) -> Observation {
        warn!(
            execution_id = %context.execution_id,
            tool = %action.tool_name,
            error = %error,
            "Tool invocation failed"
        );
        let observation = self.formatter.format_error(error, action);
        self.enrich(observation, context)
    }

    /// Attach context ids and content analysis; adjust relevance.
    pub fn enrich(&self, mut observation: Observation, context: &ExecutionContext) -> Observation {
        let metadata = &mut observation.metadata;
        metadata.insert("execution_id".into(), json!(context.execution_id));
        metadata.insert("user_id".into(), json!(context.user_id));
        metadata.insert("session_id".into(), json!(context.session_id));
        metadata.insert("conversation_id".into(), json!(context.conversation_id));
        metadata.insert("processed_at".into(), json!(Utc::now().to_rfc3339()));

        if observation.is_success && !observation.content.is_empty() {
            metadata.extend(analyze_content(&observation.content));
        }

        if observation.is_success {
            observation.relevance = enhanced_relevance(&observation);
        }
        observation
    }

    /// Usefulness for continuing the loop. With a query, the content must
    /// also share enough words with it.
    pub fn is_useful(&self, observation: &Observation, query: Option<&str>) -> bool {
        if !self.formatter.is_useful(observation) {
            return false;
        }
        match query.filter(|q| !q.is_empty()) {
            Some(query) => {
                let score = semantic_relevance(&observation.content, query);
                debug!(score, "Observation semantic relevance");
                score > 0.3
            }
            None => true,
        }
    }

    /// Prompt line with execution time (over one second) and a low
    /// relevance marker.
    pub fn format_for_llm(&self, observation: &Observation) -> String {
        let phrases = self.formatter.phrases();
        let mut formatted = self.formatter.format_for_llm(observation);
        let secs = observation.execution_time.as_secs_f64();
        if secs > 1.0 {
            formatted.push_str(&format!(" ({}: {secs:.1}s)", phrases.execution_time));
        }
        if observation.is_success && observation.relevance < 0.5 {
            formatted.push_str(&format!(" [{}]", phrases.low_relevance));
        }
        formatted
    }
}

fn analyze_content(content: &str) -> Metadata {
    let mut insights = Metadata::new();
    insights.insert("content_length".into(), json!(content.chars().count()));
    insights.insert("word_count".into(), json!(content.split_whitespace().count()));
    insights.insert(
        "line_count".into(),
        json!(content.split('\n').filter(|l| !l.is_empty()).count()),
    );

    let trimmed = content.trim_start();
    let content_type = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        "json"
    } else if content.contains("<html") || content.contains("<!DOCTYPE") {
        "html"
    } else if content.contains("http://") || content.contains("https://") {
        let urls = URL_PATTERN.as_ref().map_or(0, |re| re.find_iter(content).count());
        insights.insert("url_count".into(), json!(urls));
        "text_with_urls"
    } else {
        "plain_text"
    };
    insights.insert("content_type".into(), json!(content_type));
    insights.insert("detected_language".into(), json!(detect_language(content)));
    insights
}

/// Crude stop-word vote between Czech and English.
pub fn detect_language(content: &str) -> &'static str {
    let lower = content.to_lowercase();
    let count = |markers: &[&str]| markers.iter().filter(|w| lower.contains(&format!(" {w} "))).count();
    let czech = count(CZECH_MARKERS);
    let english = count(ENGLISH_MARKERS);
    match czech.cmp(&english) {
        std::cmp::Ordering::Greater => "cs",
        std::cmp::Ordering::Less => "en",
        std::cmp::Ordering::Equal => "unknown",
    }
}

fn enhanced_relevance(observation: &Observation) -> f64 {
    let time_adjustment = if observation.execution_time < Duration::from_secs(5) { 0.1 } else { 0.0 };
    let type_adjustment = match observation.metadata.get("content_type").and_then(|v| v.as_str()) {
        Some("json") => 0.1,
        Some("text_with_urls") => 0.05,
        Some("html") => -0.05,
        _ => 0.0,
    };
    let len = observation.content.chars().count();
    let length_adjustment = if len > 50 && len < 1000 {
        0.1
    } else if len > 1000 {
        0.05
    } else {
        0.0
    };
    (observation.relevance + time_adjustment + type_adjustment + length_adjustment).min(1.0)
}

/// Share of the query's words (longer than two characters) found in the content.
pub fn semantic_relevance(content: &str, query: &str) -> f64 {
    if content.is_empty() || query.is_empty() {
        return 0.0;
    }
    let words = |text: &str| -> HashSet<String> {
        text.to_lowercase()
            .split(' ')
            .filter(|w| w.chars().count() > 2)
            .map(String::from)
            .collect()
    };
    let query_words = words(query);
    if query_words.is_empty() {
        return 0.5;
    }
    let content_words = words(content);
    query_words.intersection(&content_words).count() as f64 / query_words.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use reagent_core::value::ParamValue;

    fn action(tool: &str) -> Action {
        Action {
            tool_id: tool.to_lowercase().replace(' ', "_"),
            tool_name: tool.into(),
            step_number: 1,
            execution_id: "exec-1".into(),
            ..Action::new()
        }
    }

    fn search_action(query: &str) -> Action {
        let mut a = action("Web Search");
        a.parameters.insert("query".into(), ParamValue::String(query.into()));
        a
    }

    #[test]
    fn summary_is_preferred_content() {
        let f = ObservationFormatter::default();
        let obs = f.format(&ToolResult::success("hello world"), &action("echo"), Duration::from_millis(5));
        assert!(obs.is_success);
        assert_eq!(obs.content, "hello world");
        assert_eq!(obs.step_number, 1);
        assert_eq!(obs.execution_id, "exec-1");
        assert_eq!(obs.metadata["content_length"], 11);
        assert_eq!(obs.metadata["has_data"], false);
    }

    #[test]
    fn map_data_renders_first_ten_non_null_entries() {
        let mut map = serde_json::Map::new();
        for i in 0..15 {
            map.insert(format!("k{i:02}"), json!(i));
        }
        map.insert("a_null".into(), Value::Null);
        let obs = ObservationFormatter::default().format(
            &ToolResult::with_data(Value::Object(map)),
            &action("lookup"),
            Duration::ZERO,
        );
        let lines: Vec<&str> = obs.content.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "k00: 0");
        assert!(!obs.content.contains("a_null"));
        assert_eq!(obs.metadata["data_type"], "object");
        assert_eq!(obs.metadata["data_keys"].as_array().unwrap().len(), 10);
    }

    #[test]
    fn list_data_renders_first_five_items_capped() {
        let long = "x".repeat(150);
        let data = json!(["a", 2, null, long, "e", "f", "g"]);
        let obs = ObservationFormatter::default().format(&ToolResult::with_data(data), &action("list"), Duration::ZERO);
        let lines: Vec<&str> = obs.content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "2");
        assert_eq!(lines[2].chars().count(), 103);
        assert_eq!(obs.metadata["data_count"], 7);
    }

    #[test]
    fn empty_success_gets_placeholder_and_base_relevance() {
        let result = ToolResult {
            is_success: true,
            data: None,
            summary: None,
            error: None,
        };
        let obs = ObservationFormatter::default().format(&result, &action("noop"), Duration::ZERO);
        assert_eq!(obs.content, ENGLISH_EMPTY);
        assert_eq!(obs.relevance, 0.3);
    }

    const ENGLISH_EMPTY: &str = "Tool ran successfully but returned no content.";

    #[test]
    fn truncation_is_bounded_and_idempotent() {
        let f = ObservationFormatter::default();
        let long = "é".repeat(5000);
        let once = f.truncate_content(&long);
        assert!(once.ends_with("... (truncated)"));
        assert_eq!(once.chars().count(), MAX_OBSERVATION_LENGTH + "... (truncated)".len());
        assert_eq!(f.truncate_content(&once), once);
        assert_eq!(f.truncate_content("short"), "short");

        let cs = ObservationFormatter::new(Language::Cs).truncate_content(&long);
        assert!(cs.ends_with("... (zkráceno)"));
    }

    #[test]
    fn error_text_truncation() {
        assert_eq!(truncate_text("abcdef", 10), "abcdef");
        assert_eq!(truncate_text("abcdefghijk", 6), "abc...");
    }

    #[test]
    fn relevance_components() {
        let content = "x".repeat(250);
        let plain = ObservationFormatter::default().format(
            &ToolResult::success(content.clone()),
            &action("echo"),
            Duration::ZERO,
        );
        assert!((plain.relevance - 0.5).abs() < 1e-9);

        let with_data = ObservationFormatter::default().format(
            &ToolResult::success(content).and_data(json!({"a": 1})),
            &action("echo"),
            Duration::ZERO,
        );
        assert!((with_data.relevance - 0.7).abs() < 1e-9);

        let keyword = ObservationFormatter::default().format(
            &ToolResult::success("rust is fast"),
            &search_action("rust python"),
            Duration::ZERO,
        );
        let expected = 12.0 / 500.0 + 0.25;
        assert!((keyword.relevance - expected).abs() < 1e-9);
        assert_eq!(keyword.metadata["tool_category"], "search");
        assert_eq!(keyword.metadata["search_query"], "rust python");
    }

    #[test]
    fn failed_result_is_bounded_error() {
        let long_reason = "r".repeat(800);
        let result = ToolResult::failure(ToolError::ExecutionFailed {
            tool_name: "calc".into(),
            reason: long_reason,
        });
        let obs = ObservationFormatter::default().format(&result, &action("calc"), Duration::ZERO);
        assert!(!obs.is_success);
        assert_eq!(obs.relevance, 0.0);
        assert_eq!(obs.error_kind, Some(ObservationErrorKind::ExecutionError));
        assert_eq!(obs.error_message.as_ref().unwrap().chars().count(), MAX_ERROR_LENGTH);
        assert!(obs.content.starts_with("Tool failed: "));
    }

    #[test]
    fn error_templates() {
        let f = ObservationFormatter::default();
        let a = action("calc");

        let obs = f.format_error(&ToolError::Timeout { tool_name: "calc".into(), timeout_secs: 3 }, &a);
        assert_eq!(obs.content, "Tool calc timed out. Try again or use a different tool.");
        assert_eq!(obs.metadata["error_type"], "timeout");

        let obs = f.format_error(&ToolError::Unauthorized { tool_name: "calc".into(), reason: "no".into() }, &a);
        assert_eq!(obs.content, "You are not authorized to use tool calc.");
        assert_eq!(obs.error_kind, Some(ObservationErrorKind::Unauthorized));

        let obs = f.format_error(
            &ToolError::InvalidParameters { tool_name: "calc".into(), reason: "bad".into() },
            &a,
        );
        assert_eq!(obs.content, "Invalid parameters for tool calc: bad");
        assert_eq!(obs.metadata["error_type"], "invalid_parameters");

        let obs = f.format_error(&ToolError::ExecutionFailed { tool_name: "calc".into(), reason: "boom".into() }, &a);
        assert_eq!(obs.content, "Tool calc failed: boom");
        assert_eq!(obs.metadata["error_type"], "execution_error");
        assert_eq!(obs.relevance, 0.0);
    }

    #[test]
    fn tool_reported_failure_reason_is_bounded() {
        let f = ObservationFormatter::default();
        let obs = f.format_error(
            &ToolError::ExecutionFailed { tool_name: "calc".into(), reason: "r".repeat(1500) },
            &action("calc"),
        );
        let template_len = "Tool calc failed: ".chars().count();
        assert_eq!(obs.error_message.as_ref().unwrap().chars().count(), MAX_ERROR_LENGTH);
        assert_eq!(obs.content.chars().count(), template_len + MAX_ERROR_LENGTH);
        assert!(obs.content.ends_with("r..."));
        assert!(f.format_for_llm(&obs).chars().count() < MAX_ERROR_LENGTH + 40);

        let obs = f.format_error(
            &ToolError::InvalidParameters { tool_name: "calc".into(), reason: "p".repeat(900) },
            &action("calc"),
        );
        assert!(obs.content.chars().count() <= "Invalid parameters for tool calc: ".len() + MAX_ERROR_LENGTH);
    }

    #[test]
    fn hard_timeout_observation() {
        let obs = ObservationFormatter::default().timed_out(&action("slow"), Duration::from_secs(30));
        assert_eq!(obs.error_message.as_deref(), Some("Timeout"));
        assert_eq!(obs.content, "Tool slow timed out (30 seconds).");
        assert_eq!(obs.execution_time, Duration::from_secs(30));
        assert_eq!(obs.error_kind, Some(ObservationErrorKind::Timeout));
    }

    #[test]
    fn llm_line_for_success_and_error() {
        let f = ObservationFormatter::default();
        let ok = Observation::success("t", "t", "result text");
        assert_eq!(f.format_for_llm(&ok), "Observation: result text");
        let bad = f.unavailable(&action("ghost"), "tool ghost is not registered");
        assert_eq!(
            f.format_for_llm(&bad),
            "Observation: Error - Cannot execute action ghost: tool ghost is not registered"
        );
    }

    #[test]
    fn processor_annotates_time_and_low_relevance() {
        let p = ObservationProcessor::default();
        let mut obs = Observation::success("t", "t", "result text");
        obs.execution_time = Duration::from_millis(2500);
        obs.relevance = 0.4;
        assert_eq!(
            p.format_for_llm(&obs),
            "Observation: result text (execution time: 2.5s) [low relevance]"
        );
        obs.execution_time = Duration::from_millis(200);
        obs.relevance = 0.9;
        assert_eq!(p.format_for_llm(&obs), "Observation: result text");
    }

    #[test]
    fn enrichment_detects_type_and_language() {
        let p = ObservationProcessor::default();
        let ctx = ExecutionContext::new().with_user("u1");
        let result = ToolResult::success("See https://a.example and https://b.example for the details on the topic");
        let obs = p.process_result(&result, &action("lookup"), &ctx, Duration::from_millis(10));
        assert_eq!(obs.metadata["execution_id"], json!(ctx.execution_id));
        assert_eq!(obs.metadata["user_id"], "u1");
        assert_eq!(obs.metadata["content_type"], "text_with_urls");
        assert_eq!(obs.metadata["url_count"], 2);
        assert_eq!(obs.metadata["detected_language"], "en");
        assert!(obs.metadata.contains_key("processed_at"));
    }

    #[test]
    fn enhanced_relevance_adds_bonuses() {
        let p = ObservationProcessor::default();
        let ctx = ExecutionContext::new();
        let content = "{\"answer\": 42, \"explanation\": \"six times seven, computed quickly\"}";
        let result = ToolResult::success(content);
        let base = ObservationFormatter::default()
            .format(&result, &action("calc"), Duration::ZERO)
            .relevance;
        let obs = p.process_result(&result, &action("calc"), &ctx, Duration::ZERO);
        assert_eq!(obs.metadata["content_type"], "json");
        // fast (+0.1), json (+0.1), 50 < len < 1000 (+0.1)
        assert!((obs.relevance - (base + 0.3)).abs() < 1e-9);
    }

    #[test]
    fn failed_observations_are_not_enriched_with_analysis() {
        let p = ObservationProcessor::default();
        let obs = p.process_error(
            &ToolError::ExecutionFailed { tool_name: "x".into(), reason: "no".into() },
            &action("x"),
            &ExecutionContext::new(),
        );
        assert!(!obs.metadata.contains_key("content_type"));
        assert_eq!(obs.relevance, 0.0);
    }

    #[test]
    fn failed_observations_carry_context_ids() {
        let p = ObservationProcessor::default();
        let ctx = ExecutionContext::new().with_user("u7").with_session("s7");
        let obs = p.process_error(
            &ToolError::Timeout { tool_name: "x".into(), timeout_secs: 1 },
            &action("x"),
            &ctx,
        );
        assert_eq!(obs.metadata["execution_id"], json!(ctx.execution_id));
        assert_eq!(obs.metadata["user_id"], "u7");
        assert_eq!(obs.metadata["session_id"], "s7");
        assert!(obs.metadata.contains_key("processed_at"));
        assert_eq!(obs.metadata["error_type"], "timeout");
    }

    #[test]
    fn usefulness() {
        let p = ObservationProcessor::default();
        let mut obs = Observation::success("s", "s", "Prague weather today is sunny and warm");
        obs.relevance = 0.8;
        assert!(p.is_useful(&obs, None));
        assert!(p.is_useful(&obs, Some("prague weather")));
        assert!(!p.is_useful(&obs, Some("tokyo stock market")));

        let mut short = Observation::success("s", "s", "ok");
        short.relevance = 1.0;
        assert!(!p.is_useful(&short, None));

        let mut irrelevant = obs.clone();
        irrelevant.relevance = 0.05;
        assert!(!p.is_useful(&irrelevant, None));

        let failed = ObservationFormatter::default().unavailable(&action("x"), "nope");
        assert!(!p.is_useful(&failed, None));
    }

    #[test]
    fn semantic_relevance_edge_cases() {
        assert_eq!(semantic_relevance("", "query"), 0.0);
        assert_eq!(semantic_relevance("content here", "a an"), 0.5);
        assert_eq!(semantic_relevance("rust is great", "rust python"), 0.5);
    }

    #[test]
    fn language_detection() {
        assert_eq!(detect_language("this is the way and it works"), "en");
        assert_eq!(detect_language("to je dobré a funguje to na jedničku"), "cs");
        assert_eq!(detect_language("12345"), "unknown");
    }
}
