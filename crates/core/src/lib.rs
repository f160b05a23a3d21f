//! # Reagent Core
//!
//! Domain types, traits, and error definitions for the Reagent ReAct
//! execution engine. Every collaborator of the loop (completion backend,
//! tool catalog, key-value store) is a trait here; implementations live in
//! their respective crates and all crates depend inward on core.

pub mod error;
pub mod value;
pub mod scratchpad;
pub mod tool;
pub mod completion;
pub mod store;
pub mod context;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{CompletionError, Error, MemoryError, Result, ToolError};
pub use value::{ParamValue, Parameters};
pub use scratchpad::{Action, Metadata, Observation, ObservationErrorKind, Scratchpad, StopReason, Thought};
pub use tool::{Tool, ToolDescriptor, ToolExecutionContext, ToolExecutor, ToolParameter, ToolRegistry, ToolResult};
pub use completion::{CompletionOptions, TextCompletion};
pub use store::KeyValueStore;
pub use context::ExecutionContext;
pub use event::{AgentEvent, EventBus};
pub use tokio_util::sync::CancellationToken;
