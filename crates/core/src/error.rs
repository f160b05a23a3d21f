//! Error types for the Reagent domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// Errors that end an execution early.
///
/// Completion, tool and memory failures never reach this level: the loop
/// turns them into fallback thoughts, failed observations or log lines.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Execution cancelled")]
    Cancelled,

    /// A completed scratchpad accepts no further entries.
    #[error("Execution {0} is already completed")]
    AlreadyCompleted(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the text completion service.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Completion returned no content")]
    EmptyResponse,

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Completion cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Tool failures. Each variant maps to one observation error kind.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool is disabled: {0}")]
    Disabled(String),

    #[error("Invalid parameters for {tool_name}: {reason}")]
    InvalidParameters { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Unauthorized: {tool_name}: {reason}")]
    Unauthorized { tool_name: String, reason: String },

    #[error("Tool execution cancelled: {0}")]
    Cancelled(String),
}
