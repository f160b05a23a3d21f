//! Text completion trait: the abstraction over LLM backends.
//!
//! The ReAct protocol is plain text, so the engine needs nothing more than
//! "prompt in, text out". Implementations: OpenAI-compatible endpoints
//! (including Ollama), and scripted mocks in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::CompletionError;

/// Sampling options for a single completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Generation halts before any of these sequences.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    500
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            stop: Vec::new(),
        }
    }
}

impl CompletionOptions {
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
            stop: Vec::new(),
        }
    }

    pub fn with_stop(mut self, stop: &[&str]) -> Self {
        self.stop = stop.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// The backend name (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Complete `prompt`. Implementations must return promptly with
    /// [`CompletionError::Cancelled`] once `cancel` fires.
    async fn complete(
        &self,
        model_id: &str,
        prompt: &str,
        conversation_id: Option<&str>,
        options: &CompletionOptions,
        cancel: CancellationToken,
    ) -> std::result::Result<String, CompletionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let opts = CompletionOptions::default();
        assert_eq!(opts.temperature, 0.7);
        assert_eq!(opts.max_tokens, 500);
        assert!(opts.stop.is_empty());
    }

    #[test]
    fn stop_sequences_serialize() {
        let opts = CompletionOptions::new(0.3, 300).with_stop(&["Observation:"]);
        let json = serde_json::to_value(&opts).unwrap();
        assert_eq!(json["stop"][0], "Observation:");
        let plain = serde_json::to_value(CompletionOptions::default()).unwrap();
        assert!(plain.get("stop").is_none());
    }
}
