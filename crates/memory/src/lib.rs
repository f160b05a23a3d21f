//! Execution memory for Reagent: a TTL key-value store and the agent
//! memory built on top of it.

pub mod in_memory;
pub mod agent_memory;

pub use in_memory::InMemoryStore;
pub use agent_memory::{AgentMemory, DEFAULT_SIMILARITY_THRESHOLD, ExecutionRecord, text_similarity};
