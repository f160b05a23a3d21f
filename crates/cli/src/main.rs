//! Reagent CLI — the main entry point.
//!
//! Commands:
//! - `run`     — Answer one question with the ReAct loop
//! - `tools`   — List the tool catalog
//! - `config`  — Show, locate, validate or generate configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "reagent",
    about = "Reagent — ReAct agent execution engine",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question, reasoning step by step with tools
    Run {
        /// The question or task
        input: String,

        /// Override the iteration limit (1-10)
        #[arg(short, long)]
        max_iterations: Option<u32>,

        /// Override the language (en, cs)
        #[arg(short, long)]
        language: Option<String>,

        /// Print the execution timeline after the answer
        #[arg(short, long)]
        timeline: bool,
    },

    /// List available tools
    Tools,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print a default config file
    Default,
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Validate the config file
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }

    match cli.command {
        Commands::Run {
            input,
            max_iterations,
            language,
            timeline,
        } => commands::run::run(&input, max_iterations, language, timeline).await?,
        Commands::Tools => commands::tools::run().await?,
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Default) {
            ConfigAction::Default => commands::config_cmd::default_file(),
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Validate => commands::config_cmd::validate()?,
        },
    }

    Ok(())
}
