//! Shared test helpers for agent tests.

use async_trait::async_trait;
use reagent_core::completion::{CompletionOptions, TextCompletion};
use reagent_core::error::CompletionError;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// A mock completion backend that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue.
/// Panics if more calls are made than responses provided.
pub struct ScriptedCompletion {
    responses: Mutex<Vec<Result<String, CompletionError>>>,
    call_count: Mutex<usize>,
    prompts: Mutex<Vec<String>>,
    options: Mutex<Vec<CompletionOptions>>,
}

impl ScriptedCompletion {
    pub fn new(responses: Vec<Result<String, CompletionError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: Mutex::new(0),
            prompts: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
        }
    }

    /// Every call succeeds with the given texts, in order.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Options received so far.
    pub fn options(&self) -> Vec<CompletionOptions> {
        self.options.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextCompletion for ScriptedCompletion {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(
        &self,
        _model_id: &str,
        prompt: &str,
        _conversation_id: Option<&str>,
        options: &CompletionOptions,
        cancel: CancellationToken,
    ) -> Result<String, CompletionError> {
        if cancel.is_cancelled() {
            return Err(CompletionError::Cancelled);
        }

        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        if *count >= responses.len() {
            panic!(
                "ScriptedCompletion: no more responses (call #{}, have {})",
                *count,
                responses.len()
            );
        }

        self.prompts.lock().unwrap().push(prompt.to_string());
        self.options.lock().unwrap().push(options.clone());
        let response = responses[*count].clone();
        *count += 1;
        response
    }
}

/// A completion backend that never answers until cancelled.
pub struct HangingCompletion;

#[async_trait]
impl TextCompletion for HangingCompletion {
    fn name(&self) -> &str {
        "hanging_mock"
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
