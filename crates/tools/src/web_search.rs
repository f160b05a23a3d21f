//! Web search tool: deterministic offline search over a small built-in
//! corpus.
//!
//! Results are ranked by how many query words appear in a document, so the
//! agent loop can be exercised end-to-end without network access.

use async_trait::async_trait;
use reagent_core::error::ToolError;
use reagent_core::tool::{Tool, ToolExecutionContext, ToolParameter, ToolResult};
use reagent_core::value::Parameters;
use serde::Serialize;

const DEFAULT_RESULTS: i64 = 3;
const MAX_RESULTS: i64 = 5;

pub struct WebSearchTool;

#[derive(Debug, Clone, Serialize)]
struct SearchHit {
    title: &'static str,
    url: &'static str,
    snippet: &'static str,
}

const CORPUS: &[SearchHit] = &[
    SearchHit {
        title: "The Rust Programming Language",
        url: "https://doc.rust-lang.org/book/",
        snippet: "Rust is a systems programming language focused on safety, speed and concurrency.",
    },
    SearchHit {
        title: "Tokio: an asynchronous Rust runtime",
        url: "https://tokio.rs/",
        snippet: "Tokio is an event-driven, non-blocking I/O platform for writing asynchronous applications with Rust.",
    },
    SearchHit {
        title: "ReAct: Synergizing Reasoning and Acting in Language Models",
        url: "https://arxiv.org/abs/2210.03629",
        snippet: "ReAct interleaves reasoning traces and task-specific actions, letting language models use tools.",
    },
    SearchHit {
        title: "Prague weather forecast",
        url: "https://weather.example.com/prague",
        snippet: "Prague weather today: partly cloudy, 18 C, light wind from the west.",
    },
    SearchHit {
        title: "Czech Republic - facts",
        url: "https://facts.example.com/czechia",
        snippet: "The capital of the Czech Republic is Prague, with a population of about 1.3 million.",
    },
];

#[async_trait]
impl Tool for WebSearchTool {
    fn id(&self) -> &str {
        "web_search"
    }

    fn name(&self) -> &str {
        "Web Search"
    }

    fn description(&self) -> &str {
        "Search the web for information. Returns relevant results with titles, URLs and snippets."
    }

    fn category(&self) -> &str {
        "search"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("query", "string", "The search query"),
            ToolParameter::optional("num_results", "integer", "Number of results to return")
                .with_default(DEFAULT_RESULTS),
        ]
    }

    async fn execute(
        &self,
        parameters: &Parameters,
        _context: &ToolExecutionContext,
    ) -> Result<ToolResult, ToolError> {
        let query = parameters
            .get("query")
            .map(|v| v.to_string())
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidParameters {
                tool_name: self.id().into(),
                reason: "missing 'query'".into(),
            })?;

        let limit = parameters
            .get("num_results")
            .and_then(|v| v.as_i64())
            .unwrap_or(DEFAULT_RESULTS)
            .clamp(1, MAX_RESULTS) as usize;

        let hits = search(&query, limit);
        if hits.is_empty() {
            return Ok(ToolResult::success(format!("No results found for '{query}'"))
                .and_data(serde_json::json!([])));
        }

        let summary = hits
            .iter()
            .map(|h| format!("{} ({}): {}", h.title, h.url, h.snippet))
            .collect::<Vec<_>>()
            .join("\n");
        let data = serde_json::to_value(&hits).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.id().into(),
            reason: e.to_string(),
        })?;
        Ok(ToolResult::success(summary).and_data(data))
    }
}

fn search(query: &str, limit: usize) -> Vec<SearchHit> {
    let words: Vec<String> = query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(String::from)
        .collect();

    let mut scored: Vec<(usize, &SearchHit)> = CORPUS
        .iter()
        .map(|hit| {
            let text = format!("{} {}", hit.title, hit.snippet).to_lowercase();
            (words.iter().filter(|w| text.contains(w.as_str())).count(), hit)
        })
        .filter(|(score, _)| *score > 0)
        .collect();
    // Stable sort keeps corpus order among ties.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(limit).map(|(_, h)| h.clone()).collect()
}
