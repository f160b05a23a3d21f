//! Configuration loading, validation, and management for Reagent.
//!
//! Loads configuration from `~/.reagent/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Languages with a prompt template and phrase table.
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "cs"];

/// The root configuration structure.
///
/// Maps directly to `~/.reagent/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Text completion backend
    #[serde(default)]
    pub completion: CompletionConfig,

    /// ReAct loop budgets and retry behaviour
    #[serde(default)]
    pub agent: AgentSettings,

    /// Execution memory
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Built-in tool catalog
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Backend kind: "ollama" or "openai".
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default model
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature for thought generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per thought
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for the terminal summarization call
    #[serde(default = "default_summary_temperature")]
    pub summary_temperature: f32,

    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,

    /// HTTP request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_provider() -> String {
    "ollama".into()
}
fn default_base_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_model() -> String {
    "llama3.2".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    500
}
fn default_summary_temperature() -> f32 {
    0.3
}
fn default_summary_max_tokens() -> u32 {
    300
}
fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            summary_temperature: default_summary_temperature(),
            summary_max_tokens: default_summary_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("summary_temperature", &self.summary_temperature)
            .field("summary_max_tokens", &self.summary_max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Iteration budget (1..=10). Executions may override it via metadata.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Wall-clock budget per execution. 0 disables it.
    #[serde(default = "default_execution_timeout_secs")]
    pub execution_timeout_secs: u64,

    /// Hard limit on a single tool call
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Extra thought-generation attempts after the first one
    #[serde(default = "default_max_thought_retries")]
    pub max_thought_retries: u32,

    /// Delay before retrying an invalid thought
    #[serde(default = "default_invalid_thought_delay_ms")]
    pub invalid_thought_delay_ms: u64,

    /// Delay before retrying a failed completion call
    #[serde(default = "default_failed_thought_delay_ms")]
    pub failed_thought_delay_ms: u64,

    /// Prompt and message language ("en" or "cs")
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_max_iterations() -> u32 {
    5
}
fn default_execution_timeout_secs() -> u64 {
    300
}
fn default_tool_timeout_secs() -> u64 {
    30
}
fn default_max_thought_retries() -> u32 {
    2
}
fn default_invalid_thought_delay_ms() -> u64 {
    1000
}
fn default_failed_thought_delay_ms() -> u64 {
    2000
}
fn default_language() -> String {
    "en".into()
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            execution_timeout_secs: default_execution_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            max_thought_retries: default_max_thought_retries(),
            invalid_thought_delay_ms: default_invalid_thought_delay_ms(),
            failed_thought_delay_ms: default_failed_thought_delay_ms(),
            language: default_language(),
        }
    }
}

impl AgentSettings {
    pub fn execution_timeout(&self) -> Option<Duration> {
        (self.execution_timeout_secs > 0).then(|| Duration::from_secs(self.execution_timeout_secs))
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// How long execution records stay in memory
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Recent thoughts consulted by the similarity check
    #[serde(default = "default_similarity_window")]
    pub similarity_window: usize,
}

fn default_ttl_secs() -> u64 {
    3600
}
fn default_similarity_window() -> usize {
    10
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            similarity_window: default_similarity_window(),
        }
    }
}

impl MemoryConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Tool ids registered but not offered to the agent
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.reagent/config.toml).
    ///
    /// Environment overrides:
    /// - `REAGENT_API_KEY`, then `OPENAI_API_KEY`
    /// - `REAGENT_BASE_URL`
    /// - `REAGENT_MODEL`
    /// - `REAGENT_LANGUAGE`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.completion.api_key.is_none() {
            self.completion.api_key = std::env::var("REAGENT_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(url) = std::env::var("REAGENT_BASE_URL") {
            self.completion.base_url = url;
        }

        if let Ok(model) = std::env::var("REAGENT_MODEL") {
            self.completion.model = model;
        }

        if let Ok(language) = std::env::var("REAGENT_LANGUAGE") {
            self.agent.language = language;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".reagent")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, t) in [
            ("completion.temperature", self.completion.temperature),
            ("completion.summary_temperature", self.completion.summary_temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0.0 and 2.0"
                )));
            }
        }

        if !(1..=10).contains(&self.agent.max_iterations) {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be between 1 and 10".into(),
            ));
        }

        if self.agent.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent.tool_timeout_secs must be > 0".into(),
            ));
        }

        if !SUPPORTED_LANGUAGES.contains(&self.agent.language.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "agent.language must be one of {SUPPORTED_LANGUAGES:?}, got '{}'",
                self.agent.language
            )));
        }

        if self.memory.ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "memory.ttl_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.completion.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.agent.tool_timeout(), Duration::from_secs(30));
        assert_eq!(config.memory.ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.completion.model, config.completion.model);
        assert_eq!(parsed.agent.language, config.agent.language);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.completion.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn iteration_budget_bounds() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 11;
        assert!(config.validate().is_err());
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
        config.agent.max_iterations = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_language_rejected() {
        let mut config = AppConfig::default();
        config.agent.language = "de".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("agent.language"));
    }

    #[test]
    fn zero_execution_timeout_disables_it() {
        let mut settings = AgentSettings::default();
        assert_eq!(settings.execution_timeout(), Some(Duration::from_secs(300)));
        settings.execution_timeout_secs = 0;
        assert_eq!(settings.execution_timeout(), None);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.completion.provider, "ollama");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[agent]\nmax_iterations = 3\nlanguage = \"cs\"\n\n[tools]\ndisabled = [\"web_search\"]"
        )
        .unwrap();
        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.agent.max_iterations, 3);
        assert_eq!(config.agent.language, "cs");
        assert_eq!(config.agent.tool_timeout_secs, 30);
        assert_eq!(config.tools.disabled, vec!["web_search".to_string()]);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent\nmax_iterations = ").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.completion.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("llama3.2"));
        assert!(toml_str.contains("tool_timeout_secs = 30"));
    }
}
