//! `reagent run` — One ReAct execution from the command line.

use reagent_agent::{ExecutionMonitor, ReactAgent};
use reagent_config::AppConfig;
use reagent_core::context::{ExecutionContext, MAX_ITERATIONS_KEY};
use reagent_core::event::AgentEvent;
use reagent_memory::{AgentMemory, InMemoryStore};
use reagent_providers::OpenAiCompatCompletion;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn run(
    input: &str,
    max_iterations: Option<u32>,
    language: Option<String>,
    show_timeline: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(language) = language {
        config.agent.language = language;
        config.validate()?;
    }
    tracing::debug!(
        provider = %config.completion.provider,
        model = %config.completion.model,
        language = %config.agent.language,
        "Loaded configuration"
    );

    // Hosted endpoints need a key; a local Ollama does not.
    if config.completion.provider != "ollama" && !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured for '{}'!", config.completion.provider);
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    REAGENT_API_KEY=sk-...");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let completion = Arc::new(OpenAiCompatCompletion::from_config(&config.completion));
    let catalog = Arc::new(reagent_tools::default_catalog(&config.tools.disabled));
    let memory = Arc::new(AgentMemory::new(
        Arc::new(InMemoryStore::new()),
        config.memory.ttl(),
    ));
    let agent = ReactAgent::from_config(&config, completion, catalog.clone(), catalog)
        .with_memory(memory.clone());

    let mut context = ExecutionContext::new().with_model(&config.completion.model);
    if let Some(n) = max_iterations {
        context = context.with_metadata(MAX_ITERATIONS_KEY, serde_json::json!(n));
    }
    let execution_id = context.execution_id.clone();

    // Ctrl+C cancels the execution; the loop still returns a scratchpad.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut events = agent.event_bus().subscribe();
    let progress = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            print_progress(&event);
        }
    });

    let scratchpad = agent.run(input, context, cancel).await;
    // Dropping the agent closes the event bus so the progress task drains and ends.
    drop(agent);
    let _ = progress.await;

    println!();
    println!("{}", scratchpad.final_answer.as_deref().unwrap_or_default());
    println!();
    eprintln!("  {}", scratchpad.status_summary());
    if let Some(reason) = scratchpad.stop_reason {
        eprintln!("  Stopped: {reason}");
    }

    if show_timeline {
        let monitor = ExecutionMonitor::new(memory);
        println!();
        println!("  Timeline");
        println!("  ────────");
        for entry in monitor.timeline(&execution_id).await? {
            println!("  {} [{}] {}", entry.icon, entry.step + 1, entry.title);
            for line in entry.content.lines() {
                println!("       {line}");
            }
        }
    }

    Ok(())
}

fn print_progress(event: &AgentEvent) {
    match event {
        AgentEvent::ExecutionStarted { max_iterations, .. } => {
            eprintln!("  Thinking (up to {max_iterations} steps)...");
        }
        AgentEvent::ThoughtGenerated {
            step,
            confidence,
            content_preview,
            ..
        } => {
            eprintln!("  💭 [{}] ({:.0}%) {content_preview}", step + 1, confidence * 100.0);
        }
        AgentEvent::ActionStarted { step, tool_id, .. } => {
            eprintln!("  🔧 [{}] {tool_id}", step + 1);
        }
        AgentEvent::ObservationReceived {
            step,
            tool_id,
            success,
            duration_ms,
            ..
        } => {
            let mark = if *success { "✅" } else { "❌" };
            eprintln!("  {mark} [{}] {tool_id} ({duration_ms} ms)", step + 1);
        }
        AgentEvent::ExecutionCompleted { .. } => {}
    }
}
