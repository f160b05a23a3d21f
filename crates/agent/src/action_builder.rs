//! Turns a thought into an [`Action`].
//!
//! `Action Input` is read as a JSON object when possible. Otherwise
//! `key=value` / `key: value` pairs are extracted (quoted or bare, first
//! occurrence of a key wins) and bare values are coerced to the narrowest
//! type. Input that yields no pairs becomes `{"query": <input>}`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex_lite::Regex;
use reagent_core::scratchpad::{Action, Thought};
use reagent_core::value::{ParamValue, Parameters, parameters_to_json};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::parser::OutputParser;

/// Key/value patterns, tried in order.
static KEY_VALUE_PATTERNS: LazyLock<Result<Vec<Regex>, regex_lite::Error>> = LazyLock::new(|| {
    [
        r#"(\w+)\s*=\s*"([^"]*)""#,
        r"(\w+)\s*=\s*'([^']*)'",
        r"(\w+)\s*=\s*([^,\n]+)",
        r#"(\w+)\s*:\s*"([^"]*)""#,
        r"(\w+)\s*:\s*'([^']*)'",
        r"(\w+)\s*:\s*([^,\n]+)",
    ]
    .into_iter()
    .map(Regex::new)
    .collect()
});

pub struct ActionBuilder {
    parser: OutputParser,
}

impl ActionBuilder {
    pub fn new(parser: OutputParser) -> Self {
        Self { parser }
    }

    /// Build the action a thought asks for.
    ///
    /// A thought with neither a final answer nor an action yields an empty
    /// action: a pure reasoning step.
    pub fn build_action(&self, thought: &Thought) -> Action {
        let mut action = Action {
            step_number: thought.step_number,
            execution_id: thought.execution_id.clone(),
            reasoning: Some(thought.content.clone()),
            ..Action::new()
        };

        let parsed = self.parser.parse(&thought.raw_output);

        if parsed.is_final_answer {
            if let Some(answer) = parsed.final_answer.filter(|a| !a.is_empty()) {
                action.is_final_answer = true;
                action.final_answer = Some(answer);
                action.confidence = thought.confidence;
                debug!(step = thought.step_number, "Built final answer action");
                return action;
            }
        }

        if let Some(tool_name) = parsed.action {
            action.tool_id = normalize_tool_id(&tool_name);
            action.tool_name = tool_name;
            action.confidence = thought.confidence;
            if let Some(input) = parsed.action_input {
                action.parameters = parse_action_input(&input);
                action.input = input;
            }
            debug!(
                step = thought.step_number,
                tool = %action.tool_id,
                params = action.parameters.len(),
                "Built tool action"
            );
        } else {
            debug!(step = thought.step_number, "No action in thought, treating as reasoning step");
        }

        action
    }
}

impl Default for ActionBuilder {
    fn default() -> Self {
        Self::new(OutputParser::default())
    }
}

/// Parse the text after `Action Input:`.
pub fn parse_action_input(input: &str) -> Parameters {
    let trimmed = strip_code_fence(input.trim());
    if trimmed.is_empty() {
        return Parameters::new();
    }

    if let Ok(map) = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(trimmed) {
        return map.into_iter().map(|(k, v)| (k, from_json(v))).collect();
    }

    let pairs = parse_key_value_pairs(trimmed);
    if !pairs.is_empty() {
        return pairs;
    }

    let mut params = Parameters::new();
    params.insert("query".into(), ParamValue::String(trimmed.to_string()));
    params
}

/// JSON carries no date type, so date-shaped strings become
/// [`ParamValue::DateTime`] as they would in `key=value` input.
fn from_json(value: serde_json::Value) -> ParamValue {
    use serde_json::Value;
    match value {
        Value::String(s) => match parse_datetime(&s) {
            Some(dt) => ParamValue::DateTime(dt),
            None => ParamValue::String(s),
        },
        Value::Array(items) => ParamValue::Array(items.into_iter().map(from_json).collect()),
        Value::Object(map) => ParamValue::Object(map.into_iter().map(|(k, v)| (k, from_json(v))).collect()),
        other => ParamValue::from(other),
    }
}

/// Models like to wrap JSON in ```json fences.
fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim()
}

fn parse_key_value_pairs(input: &str) -> Parameters {
    let mut params = Parameters::new();
    let patterns = match &*KEY_VALUE_PATTERNS {
        Ok(patterns) => patterns,
        Err(e) => {
            warn!(error = %e, "Key/value patterns unavailable");
            return params;
        }
    };

    for pattern in patterns {
        for caps in pattern.captures_iter(input) {
            let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let key = key.as_str().trim();
            if !params.contains_key(key) {
                params.insert(key.to_string(), coerce_value(value.as_str().trim()));
            }
        }
    }
    params
}

/// Coerce a bare value: bool, then integer, then float, then date/time,
/// else string.
pub fn coerce_value(raw: &str) -> ParamValue {
    if raw.is_empty() {
        return ParamValue::String(String::new());
    }
    if raw.eq_ignore_ascii_case("true") {
        return ParamValue::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return ParamValue::Bool(false);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return ParamValue::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return ParamValue::Float(f);
        }
    }
    if let Some(dt) = parse_datetime(raw) {
        return ParamValue::DateTime(dt);
    }
    ParamValue::String(raw.to_string())
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Lowercase, with spaces and hyphens turned into underscores.
pub fn normalize_tool_id(tool_name: &str) -> String {
    tool_name
        .trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
}

pub fn is_valid_action(action: &Action) -> bool {
    if action.is_final_answer {
        return action.final_answer.as_deref().is_some_and(|a| !a.is_empty());
    }
    !action.tool_id.is_empty() || !action.tool_name.is_empty()
}

/// Render an action back into protocol lines.
pub fn format_action_for_llm(action: &Action) -> String {
    if action.is_final_answer {
        return format!("Final Answer: {}", action.final_answer.as_deref().unwrap_or_default());
    }
    let mut formatted = format!("Action: {}", action.tool_name);
    if !action.parameters.is_empty() {
        formatted.push_str(&format!("\nAction Input: {}", parameters_to_json(&action.parameters)));
    }
    formatted
}
