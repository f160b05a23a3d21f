//! OpenAI-compatible text completion backend.
//!
//! Works with OpenAI, Ollama (`/v1`), vLLM and any endpoint exposing
//! `/chat/completions`. The ReAct prompt is sent as a single user message;
//! stop sequences are forwarded so generation halts before the model
//! invents its own `Observation:`.

use async_trait::async_trait;
use reagent_config::CompletionConfig;
use reagent_core::completion::{CompletionOptions, TextCompletion};
use reagent_core::error::CompletionError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct OpenAiCompatCompletion {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatCompletion {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenAI backend (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key, Duration::from_secs(120))
    }

    /// Create an Ollama backend (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama ignores the key
            Duration::from_secs(120),
        )
    }

    pub fn from_config(config: &CompletionConfig) -> Self {
        Self::new(
            config.provider.clone(),
            config.base_url.clone(),
            config.api_key.clone().unwrap_or_else(|| config.provider.clone()),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn request_body(model_id: &str, prompt: &str, options: &CompletionOptions) -> ApiRequest {
        ApiRequest {
            model: model_id.to_string(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: prompt.to_string(),
            }],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stop: options.stop.clone(),
            stream: false,
        }
    }

    async fn send(
        &self,
        model_id: &str,
        prompt: &str,
        conversation_id: Option<&str>,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(model_id, prompt, options);

        debug!(
            provider = %self.name,
            model = %model_id,
            conversation = conversation_id.unwrap_or("-"),
            prompt_len = prompt.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(e.to_string())
                } else {
                    CompletionError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(CompletionError::RateLimited { retry_after_secs: 5 });
        }

        if status == 401 || status == 403 {
            return Err(CompletionError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status == 404 {
            return Err(CompletionError::ModelNotFound(model_id.to_string()));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Completion backend returned error");
            return Err(CompletionError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| CompletionError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        extract_text(api_response)
    }
}

fn extract_text(response: ApiResponse) -> Result<String, CompletionError> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(CompletionError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl TextCompletion for OpenAiCompatCompletion {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        model_id: &str,
        prompt: &str,
        conversation_id: Option<&str>,
        options: &CompletionOptions,
        cancel: CancellationToken,
    ) -> Result<String, CompletionError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CompletionError::Cancelled),
            result = self.send(model_id, prompt, conversation_id, options) => result,
        }
    }
}

// ── Wire types ──

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
