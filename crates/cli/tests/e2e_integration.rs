//! End-to-end integration tests for the Reagent ReAct engine.
//!
//! These tests exercise the full pipeline from question to final answer:
//! prompt building, output parsing, action building, tool execution,
//! observation formatting, memory and monitoring.

use std::sync::Arc;
use std::time::Duration;

use reagent_agent::{
    ActionBuilder, ExecutionMonitor, Language, OutputParser, ReactAgent, RetryPolicy,
    format_action_for_llm,
};
use reagent_config::AppConfig;
use reagent_core::completion::{CompletionOptions, TextCompletion};
use reagent_core::context::ExecutionContext;
use reagent_core::error::CompletionError;
use reagent_core::event::AgentEvent;
use reagent_core::scratchpad::{Action, ObservationErrorKind, StopReason, Thought};
use reagent_core::value::ParamValue;
use reagent_memory::{AgentMemory, InMemoryStore};
use reagent_tools::{ToolCatalog, default_catalog};
use tokio_util::sync::CancellationToken;

// ── Mock Completion ──────────────────────────────────────────────────────

/// A mock completion backend that returns scripted responses in sequence.
struct ScriptedCompletion {
    responses: std::sync::Mutex<Vec<String>>,
    call_count: std::sync::Mutex<usize>,
}

impl ScriptedCompletion {
    fn new(responses: &[&str]) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
            call_count: std::sync::Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl TextCompletion for ScriptedCompletion {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(
        &self,
        _model_id: &str,
        _prompt: &str,
        _conversation_id: Option<&str>,
        _options: &CompletionOptions,
        cancel: CancellationToken,
    ) -> Result<String, CompletionError> {
        if cancel.is_cancelled() {
            return Err(CompletionError::Cancelled);
        }
        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        if *count >= responses.len() {
            panic!(
                "ScriptedCompletion exhausted: call #{}, have {}",
                *count,
                responses.len()
            );
        }
        let resp = responses[*count].clone();
        *count += 1;
        Ok(resp)
    }
}

/// Answers only when cancelled.
struct StuckCompletion;

#[async_trait::async_trait]
impl TextCompletion for StuckCompletion {
    fn name(&self) -> &str {
        "stuck"
    }

    async fn complete(
        &self,
        _model_id: &str,
        _prompt: &str,
        _conversation_id: Option<&str>,
        _options: &CompletionOptions,
        cancel: CancellationToken,
    ) -> Result<String, CompletionError> {
        cancel.cancelled().await;
        Err(CompletionError::Cancelled)
    }
}

fn make_agent(completion: Arc<dyn TextCompletion>, catalog: ToolCatalog) -> ReactAgent {
    let catalog = Arc::new(catalog);
    ReactAgent::new(completion, catalog.clone(), catalog, "mock-model")
        .with_retry_policy(RetryPolicy::new(2, Duration::ZERO, Duration::ZERO))
}

fn make_memory() -> Arc<AgentMemory> {
    Arc::new(AgentMemory::new(
        Arc::new(InMemoryStore::new()),
        Duration::from_secs(3600),
    ))
}

// ── E2E: Full ReAct Pipeline ─────────────────────────────────────────────

#[tokio::test]
async fn e2e_react_direct_answer_no_tools() {
    let provider = Arc::new(ScriptedCompletion::new(&[
        "Thought: This is basic arithmetic I can answer directly.\nFinal Answer: 4",
    ]));
    let agent = make_agent(provider.clone(), default_catalog(&[]));

    let pad = agent
        .run("What is 2+2?", ExecutionContext::new(), CancellationToken::new())
        .await;

    assert!(pad.is_completed);
    assert_eq!(pad.final_answer.as_deref(), Some("4"));
    assert_eq!(pad.stop_reason, Some(StopReason::FinalAnswer));
    assert_eq!(pad.current_step, 1);
    assert_eq!(pad.actions.len(), 1);
    assert!(pad.observations.is_empty());
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn e2e_react_calculator_tool_invocation() {
    // Scenario: the agent uses the calculator, then answers.
    let provider = Arc::new(ScriptedCompletion::new(&[
        "Thought: I need to compute this with the calculator.\nAction: calculator\nAction Input: {\"expression\": \"(2 + 3) * 4\"}",
        "Thought: The calculator returned 20.\nFinal Answer: (2 + 3) * 4 = 20",
    ]));
    let agent = make_agent(provider.clone(), default_catalog(&[]));

    let pad = agent
        .run("What is (2+3)*4?", ExecutionContext::new(), CancellationToken::new())
        .await;

    assert_eq!(pad.final_answer.as_deref(), Some("(2 + 3) * 4 = 20"));
    assert_eq!(pad.actions.len(), 2);
    assert_eq!(pad.actions[0].tool_id, "calculator");
    assert!(pad.actions[1].is_final_answer);
    assert_eq!(pad.observations.len(), 1);
    assert_eq!(pad.observations[0].content, "20");
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn e2e_react_web_search_by_display_name() {
    // The model writes the display name and key=value input.
    let provider = Arc::new(ScriptedCompletion::new(&[
        "Thought: I should look up the weather.\nAction: Web Search\nAction Input: query=\"Prague weather\", num_results=1",
        "Thought: The search found the forecast.\nFinal Answer: Partly cloudy, 18 C.",
    ]));
    let agent = make_agent(provider, default_catalog(&[]));

    let pad = agent
        .run("Weather in Prague?", ExecutionContext::new(), CancellationToken::new())
        .await;

    let action = &pad.actions[0];
    assert_eq!(action.tool_name, "Web Search");
    assert_eq!(action.tool_id, "web_search");
    assert_eq!(action.parameters["num_results"], ParamValue::Int(1));

    let observation = &pad.observations[0];
    assert!(observation.is_success);
    assert!(observation.content.contains("Prague weather forecast"));
    assert_eq!(pad.final_answer.as_deref(), Some("Partly cloudy, 18 C."));
}

#[tokio::test]
async fn e2e_repeated_failure_abort() {
    // A disabled tool fails three times in a row; the loop gives up at
    // step 3 even though ten iterations are allowed.
    let search = "Thought: I need to search the web.\nAction: web_search\nAction Input: {\"query\": \"rust\"}";
    let provider = Arc::new(ScriptedCompletion::new(&[search, search, search]));
    let agent = make_agent(provider.clone(), default_catalog(&["web_search".to_string()]));
    let context = ExecutionContext::new().with_metadata("react_max_iterations", serde_json::json!(10));

    let pad = agent.run("Tell me about Rust", context, CancellationToken::new()).await;

    assert!(pad.is_completed);
    assert_eq!(pad.stop_reason, Some(StopReason::RepeatedFailures));
    assert_eq!(pad.current_step, 3);
    assert_eq!(pad.observations.len(), 3);
    assert!(
        pad.observations
            .iter()
            .all(|o| o.error_kind == Some(ObservationErrorKind::ToolUnavailable))
    );
    assert!(pad.final_answer.is_some());
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn e2e_unknown_tool_does_not_break_the_loop() {
    let provider = Arc::new(ScriptedCompletion::new(&[
        "Thought: Maybe a translator would help.\nAction: translator\nAction Input: {\"text\": \"ahoj\"}",
        "Thought: That tool does not exist, I know the answer anyway.\nFinal Answer: hello",
    ]));
    let agent = make_agent(provider, default_catalog(&[]));

    let pad = agent
        .run("Translate ahoj", ExecutionContext::new(), CancellationToken::new())
        .await;

    assert_eq!(pad.final_answer.as_deref(), Some("hello"));
    assert!(!pad.observations[0].is_success);
    assert!(pad.observations[0].content.contains("translator"));
}

#[tokio::test]
async fn e2e_bounded_iterations_always_complete() {
    let thinking = "Thought: I am still thinking about the question.";
    for limit in 1..=3u32 {
        let responses: Vec<&str> = std::iter::repeat_n(thinking, limit as usize).collect();
        let provider = Arc::new(ScriptedCompletion::new(&responses));
        let agent = make_agent(provider.clone(), default_catalog(&[])).with_max_iterations(limit);

        let pad = agent
            .run("Hard question", ExecutionContext::new(), CancellationToken::new())
            .await;

        assert!(pad.is_completed);
        assert_eq!(pad.current_step, limit);
        assert_eq!(pad.stop_reason, Some(StopReason::MaxIterations));
        assert_eq!(
            pad.final_answer.as_deref(),
            Some("I could not find an answer to your question.")
        );
        assert_eq!(provider.calls(), limit as usize);
    }
}

#[tokio::test]
async fn e2e_cancellation_mid_execution() {
    let agent = make_agent(Arc::new(StuckCompletion), default_catalog(&[]));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let pad = tokio::time::timeout(
        Duration::from_secs(5),
        agent.run("anything", ExecutionContext::new(), cancel),
    )
    .await
    .expect("cancellation should end the run promptly");

    assert!(pad.is_completed);
    assert_eq!(pad.stop_reason, Some(StopReason::Cancelled));
    assert_eq!(pad.final_answer.as_deref(), Some("Processing was cancelled."));
}

#[tokio::test]
async fn e2e_czech_execution() {
    let provider = Arc::new(ScriptedCompletion::new(&[
        "Myšlenka: Potřebuji spočítat výsledek.\nAkce: calculator\nVstup akce: expression=6*7",
        "Myšlenka: Mám výsledek.\nFinální odpověď: 42",
    ]));
    let agent = make_agent(provider, default_catalog(&[])).with_language(Language::Cs);

    let pad = agent
        .run("Kolik je 6*7?", ExecutionContext::new(), CancellationToken::new())
        .await;

    assert_eq!(pad.observations[0].content, "42");
    assert_eq!(pad.final_answer.as_deref(), Some("42"));
}

// ── E2E: Parser round-trip ───────────────────────────────────────────────

#[test]
fn e2e_parser_round_trip() {
    let builder = ActionBuilder::default();
    let parser = OutputParser::default();

    let mut action = Action::new();
    action.tool_name = "web_search".into();
    action.tool_id = "web_search".into();
    action.parameters.insert("query".into(), ParamValue::from("rust async"));
    action.parameters.insert("num_results".into(), ParamValue::Int(2));

    let rendered = format_action_for_llm(&action);
    let parsed = parser.parse(&rendered);
    assert_eq!(parsed.action.as_deref(), Some("web_search"));

    let mut thought = Thought::new("search");
    thought.raw_output = rendered;
    let rebuilt = builder.build_action(&thought);
    assert_eq!(rebuilt.tool_name, action.tool_name);
    assert_eq!(rebuilt.parameters, action.parameters);

    let answer = Action::final_answer("Rust is fast.");
    let mut thought = Thought::new("done");
    thought.raw_output = format_action_for_llm(&answer);
    let rebuilt = builder.build_action(&thought);
    assert!(rebuilt.is_final_answer);
    assert_eq!(rebuilt.final_answer.as_deref(), Some("Rust is fast."));
}

#[test]
fn e2e_final_answer_wins_over_action() {
    let parsed = OutputParser::default()
        .parse("Thought: x\nAction: web_search\nAction Input: {\"query\": \"q\"}\nFinal Answer: done");
    assert!(parsed.is_final_answer);
    assert_eq!(parsed.final_answer.as_deref(), Some("done"));
    assert!(parsed.action.is_none());
}

// ── E2E: Memory and monitoring ───────────────────────────────────────────

#[tokio::test]
async fn e2e_memory_and_timeline() {
    let provider = Arc::new(ScriptedCompletion::new(&[
        "Thought: I need the calculator for this sum.\nAction: calculator\nAction Input: {\"expression\": \"2+2\"}",
        "Thought: The calculator answered.\nFinal Answer: 4",
    ]));
    let memory = make_memory();
    let agent = make_agent(provider, default_catalog(&[])).with_memory(memory.clone());
    let context = ExecutionContext::new().with_execution_id("exec-e2e");

    agent.run("What is 2+2?", context, CancellationToken::new()).await;

    let monitor = ExecutionMonitor::new(memory.clone());
    let stored = monitor.get_scratchpad("exec-e2e").await.unwrap().unwrap();
    assert!(stored.is_completed);
    assert_eq!(stored.final_answer.as_deref(), Some("4"));
    assert_eq!(stored.original_input, "What is 2+2?");

    let timeline = monitor.timeline("exec-e2e").await.unwrap();
    let titles: Vec<&str> = timeline.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles.len(), 5);
    assert_eq!(titles[1], "Action: calculator");
    assert_eq!(titles[2], "Observation: calculator");
    assert_eq!(titles[4], "Final Answer");

    let recent = memory.recent_thoughts(10).await.unwrap();
    assert_eq!(recent.len(), 2);
}

// ── E2E: Event bus ───────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_event_bus_pubsub() {
    let provider = Arc::new(ScriptedCompletion::new(&[
        "Thought: Simple enough to answer right away.\nFinal Answer: yes",
    ]));
    let agent = make_agent(provider, default_catalog(&[]));
    let mut rx = agent.event_bus().subscribe();

    let pad = agent
        .run("Is Rust fast?", ExecutionContext::new(), CancellationToken::new())
        .await;

    let first = rx.recv().await.unwrap();
    assert!(matches!(first.as_ref(), AgentEvent::ExecutionStarted { .. }));

    let mut completed = None;
    while let Ok(event) = rx.try_recv() {
        if let AgentEvent::ExecutionCompleted { execution_id, reason, .. } = event.as_ref() {
            completed = Some((execution_id.clone(), *reason));
        }
    }
    assert_eq!(completed, Some((pad.execution_id.clone(), StopReason::FinalAnswer)));
}

// ── E2E: Configuration ───────────────────────────────────────────────────

#[test]
fn e2e_config_defaults_and_validation() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.agent.max_iterations, 5);
    assert_eq!(config.agent.tool_timeout(), Duration::from_secs(30));

    let agent = ReactAgent::from_config(
        &config,
        Arc::new(ScriptedCompletion::new(&[])),
        Arc::new(default_catalog(&[])),
        Arc::new(default_catalog(&[])),
    );
    assert_eq!(agent.max_iterations_for(&ExecutionContext::new()), 5);

    let toml_str = AppConfig::default_toml();
    let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
    assert_eq!(parsed.agent.language, "en");
}
