//! Per-execution context carried through the ReAct loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Metadata key that overrides the iteration budget for one execution.
pub const MAX_ITERATIONS_KEY: &str = "react_max_iterations";

/// Identity, budget and caller metadata of one execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub execution_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Model to complete with. `None` uses the engine default.
    #[serde(default)]
    pub model_id: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Wall-clock budget for the whole execution.
    #[serde(default)]
    pub execution_timeout: Option<Duration>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            execution_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            session_id: None,
            conversation_id: None,
            model_id: None,
            started_at: Utc::now(),
            execution_timeout: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_execution_id(mut self, id: impl Into<String>) -> Self {
        self.execution_id = id.into();
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Iteration override from metadata, if it is an integer.
    pub fn max_iterations_override(&self) -> Option<i64> {
        self.metadata.get(MAX_ITERATIONS_KEY).and_then(|v| v.as_i64())
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
