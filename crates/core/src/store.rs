//! Key-value store trait: the shared cache behind agent memory.
//!
//! Entries expire after a per-entry TTL. Each execution writes only keys
//! suffixed with its own execution id, so concurrent executions never
//! contend on the same entry.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::MemoryError;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// The backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Fetch a live entry. Expired entries read as `None`.
    async fn get(&self, key: &str) -> std::result::Result<Option<serde_json::Value>, MemoryError>;

    /// Insert or replace an entry. `ttl = None` keeps it until removed.
    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> std::result::Result<(), MemoryError>;

    /// Remove an entry. Returns whether it existed.
    async fn remove(&self, key: &str) -> std::result::Result<bool, MemoryError>;
}
