//! ReAct output parser.
//!
//! Splits raw model output into labelled sections. A label counts only at
//! the start of a line (leading whitespace allowed) and is matched without
//! regard to case, so `thought:`, `THOUGHT :` and `Myšlenka:` are all
//! recognised. Each section runs until the next label or end of text.
//!
//! Parsing never fails: output with no recognisable section yields a
//! [`ParsedOutput`] with `is_valid == false`.

use std::fmt;
use tracing::{debug, warn};

/// The protocol sections a label can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Thought,
    Action,
    ActionInput,
    FinalAnswer,
    Observation,
}

/// Accepted spellings for each label.
#[derive(Debug, Clone)]
pub struct LabelSet {
    pub thought: Vec<String>,
    pub action: Vec<String>,
    pub action_input: Vec<String>,
    pub final_answer: Vec<String>,
    pub observation: Vec<String>,
}

impl LabelSet {
    pub fn english() -> Self {
        Self {
            thought: vec!["Thought".into()],
            action: vec!["Action".into()],
            action_input: vec!["Action Input".into()],
            final_answer: vec!["Final Answer".into()],
            observation: vec!["Observation".into()],
        }
    }

    pub fn czech() -> Self {
        Self {
            thought: vec!["Myšlenka".into()],
            action: vec!["Akce".into()],
            action_input: vec!["Vstup akce".into()],
            final_answer: vec!["Finální odpověď".into()],
            observation: vec!["Pozorování".into()],
        }
    }

    /// English and Czech labels together.
    pub fn bilingual() -> Self {
        Self::english().merge(Self::czech())
    }

    pub fn merge(mut self, other: LabelSet) -> Self {
        self.thought.extend(other.thought);
        self.action.extend(other.action);
        self.action_input.extend(other.action_input);
        self.final_answer.extend(other.final_answer);
        self.observation.extend(other.observation);
        self
    }

    /// Flatten to `(kind, lowercase label)` pairs, longest first so that
    /// `Action Input` is tried before `Action`.
    fn flatten(&self) -> Vec<(LabelKind, String)> {
        let mut labels: Vec<(LabelKind, String)> = [
            (LabelKind::Thought, &self.thought),
            (LabelKind::Action, &self.action),
            (LabelKind::ActionInput, &self.action_input),
            (LabelKind::FinalAnswer, &self.final_answer),
            (LabelKind::Observation, &self.observation),
        ]
        .into_iter()
        .flat_map(|(kind, names)| {
            names
                .iter()
                .map(|n| n.trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .map(move |n| (kind, n))
        })
        .collect();
        labels.sort_by(|a, b| b.1.chars().count().cmp(&a.1.chars().count()));
        labels
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::bilingual()
    }
}

/// Result of parsing one model response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOutput {
    pub is_valid: bool,
    pub error_message: Option<String>,
    pub thought: Option<String>,
    /// Tool name, the trimmed first line of the `Action` section.
    pub action: Option<String>,
    pub action_input: Option<String>,
    pub observation: Option<String>,
    pub is_final_answer: bool,
    pub final_answer: Option<String>,
}

impl ParsedOutput {
    pub fn has_thought(&self) -> bool {
        self.thought.is_some()
    }

    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }
}

impl fmt::Display for ParsedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_final_answer {
            return write!(f, "Final Answer: {}", self.final_answer.as_deref().unwrap_or_default());
        }
        let parts: Vec<String> = [
            ("Thought", &self.thought),
            ("Action", &self.action),
            ("Action Input", &self.action_input),
            ("Observation", &self.observation),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_ref().map(|v| format!("{label}: {v}")))
        .collect();
        f.write_str(&parts.join("\n"))
    }
}

/// One label occurrence: which label, where it starts, where its text starts.
struct LabelHit {
    kind: LabelKind,
    start: usize,
    body: usize,
}

#[derive(Debug, Clone)]
pub struct OutputParser {
    labels: Vec<(LabelKind, String)>,
}

impl OutputParser {
    pub fn new(labels: LabelSet) -> Self {
        Self {
            labels: labels.flatten(),
        }
    }

    pub fn parse(&self, raw: &str) -> ParsedOutput {
        let mut result = ParsedOutput::default();

        if raw.trim().is_empty() {
            result.error_message = Some("Empty model response".into());
            return result;
        }

        let hits = self.scan(raw);
        let section = |kind: LabelKind| -> Option<String> {
            hits.iter().enumerate().find_map(|(i, hit)| {
                if hit.kind != kind {
                    return None;
                }
                let end = hits.get(i + 1).map_or(raw.len(), |next| next.start);
                let text = raw[hit.body..end].trim();
                (!text.is_empty()).then(|| text.to_string())
            })
        };

        result.thought = section(LabelKind::Thought);
        result.observation = section(LabelKind::Observation);

        let action = section(LabelKind::Action)
            .and_then(|s| s.lines().next().map(|l| l.trim().to_string()))
            .filter(|s| !s.is_empty());

        if let Some(answer) = section(LabelKind::FinalAnswer) {
            if let Some(tool) = &action {
                warn!(action = %tool, "Output has both an action and a final answer; using the final answer");
            }
            result.is_final_answer = true;
            result.final_answer = Some(answer);
            result.is_valid = true;
            debug!("Parsed final answer");
            return result;
        }

        if action.is_some() {
            result.action = action;
            result.action_input = section(LabelKind::ActionInput);
        }

        if result.thought.is_none() && result.action.is_none() {
            result.error_message =
                Some("No valid thought, action or final answer found in model response".into());
            debug!(preview = %raw.chars().take(200).collect::<String>(), "Unparseable model output");
        } else {
            result.is_valid = true;
        }
        result
    }

    /// True iff the text carries a thought or a final answer.
    pub fn is_valid_format(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let parsed = self.parse(text);
        parsed.has_thought() || parsed.is_final_answer
    }

    fn scan(&self, raw: &str) -> Vec<LabelHit> {
        let mut hits = Vec::new();
        let mut offset = 0;
        for line in raw.split_inclusive('\n') {
            let indent = line.len() - line.trim_start().len();
            let rest = &line[indent..];
            for (kind, label) in &self.labels {
                if let Some(consumed) = match_label(rest, label) {
                    hits.push(LabelHit {
                        kind: *kind,
                        start: offset + indent,
                        body: offset + indent + consumed,
                    });
                    break;
                }
            }
            offset += line.len();
        }
        hits
    }
}

impl Default for OutputParser {
    fn default() -> Self {
        Self::new(LabelSet::default())
    }
}

/// If `text` starts with `label` (case-insensitive, spaces in the label
/// matching any run of blanks) followed by optional blanks and `:`, return
/// the byte length consumed including the colon.
fn match_label(text: &str, label: &str) -> Option<usize> {
    let mut chars = text.char_indices().peekable();
    for expected in label.chars() {
        if expected == ' ' {
            let mut any = false;
            while chars.next_if(|(_, c)| *c == ' ' || *c == '\t').is_some() {
                any = true;
            }
            if !any {
                return None;
            }
            continue;
        }
        let (_, actual) = chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }
    while chars.next_if(|(_, c)| *c == ' ' || *c == '\t').is_some() {}
    match chars.next() {
        Some((i, ':')) => Some(i + 1),
        _ => None,
    }
}
