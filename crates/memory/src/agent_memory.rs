//! Per-execution memory of thoughts, actions and observations.
//!
//! Each execution's records live under its own keys in a shared
//! [`KeyValueStore`] and expire together after the configured TTL:
//!
//! | key                    | value                  |
//! |------------------------|------------------------|
//! | `thoughts_{id}`        | `Vec<Thought>`         |
//! | `actions_{id}`         | `Vec<Action>`          |
//! | `observations_{id}`    | `Vec<Observation>`     |
//! | `execution_{id}`       | [`ExecutionRecord`]    |

use chrono::{DateTime, Utc};
use reagent_core::error::MemoryError;
use reagent_core::scratchpad::{Action, Observation, Scratchpad, StopReason, Thought};
use reagent_core::store::KeyValueStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// How many execution ids the recency index keeps.
const RECENT_EXECUTIONS: usize = 100;

/// How many thoughts the similarity window keeps.
const RECENT_THOUGHTS: usize = 100;

/// Default similarity threshold for [`AgentMemory::has_similar_thought`].
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Execution-level facts that are not part of the three entry lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub original_input: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub current_step: u32,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub final_answer: Option<String>,
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    fn from_scratchpad(pad: &Scratchpad) -> Self {
        Self {
            original_input: pad.original_input.clone(),
            started_at: pad.started_at,
            current_step: pad.current_step,
            is_completed: pad.is_completed,
            final_answer: pad.final_answer.clone(),
            stop_reason: pad.stop_reason,
            completed_at: pad.completed_at,
        }
    }
}

/// A stored thought's text, kept in process for similarity checks.
struct RecentThought {
    execution_id: String,
    content: String,
    stored_at: Instant,
}

pub struct AgentMemory {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
    recent: RwLock<VecDeque<String>>,
    /// Newest first.
    thought_window: RwLock<VecDeque<RecentThought>>,
}

impl AgentMemory {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            recent: RwLock::new(VecDeque::new()),
            thought_window: RwLock::new(VecDeque::new()),
        }
    }

    /// Register a fresh execution and its input.
    pub async fn begin_execution(&self, scratchpad: &Scratchpad) -> Result<(), MemoryError> {
        self.put(&record_key(&scratchpad.execution_id), &ExecutionRecord::from_scratchpad(scratchpad))
            .await?;

        let mut recent = self.recent.write().await;
        recent.retain(|id| id != &scratchpad.execution_id);
        recent.push_front(scratchpad.execution_id.clone());
        recent.truncate(RECENT_EXECUTIONS);
        Ok(())
    }

    pub async fn store_thought(&self, thought: &Thought) -> Result<(), MemoryError> {
        self.append(&thoughts_key(&thought.execution_id), thought).await?;

        let mut window = self.thought_window.write().await;
        window.push_front(RecentThought {
            execution_id: thought.execution_id.clone(),
            content: thought.content.clone(),
            stored_at: Instant::now(),
        });
        window.truncate(RECENT_THOUGHTS);
        drop(window);

        debug!(execution_id = %thought.execution_id, step = thought.step_number, "Stored thought");
        Ok(())
    }

    pub async fn store_action(&self, action: &Action) -> Result<(), MemoryError> {
        self.append(&actions_key(&action.execution_id), action).await?;
        debug!(execution_id = %action.execution_id, tool = %action.tool_name, "Stored action");
        Ok(())
    }

    pub async fn store_observation(&self, observation: &Observation) -> Result<(), MemoryError> {
        self.append(&observations_key(&observation.execution_id), observation)
            .await?;
        debug!(
            execution_id = %observation.execution_id,
            success = observation.is_success,
            "Stored observation"
        );
        Ok(())
    }

    /// Persist the final state of a finished execution.
    pub async fn record_completion(&self, scratchpad: &Scratchpad) -> Result<(), MemoryError> {
        self.put(&record_key(&scratchpad.execution_id), &ExecutionRecord::from_scratchpad(scratchpad))
            .await
    }

    /// Rebuild a scratchpad from stored entries. `None` when nothing is
    /// stored for this execution (never started, cleared, or expired).
    pub async fn get_scratchpad(&self, execution_id: &str) -> Result<Option<Scratchpad>, MemoryError> {
        let record: Option<ExecutionRecord> = self.fetch(&record_key(execution_id)).await?;
        let thoughts: Vec<Thought> = self.fetch(&thoughts_key(execution_id)).await?.unwrap_or_default();
        let actions: Vec<Action> = self.fetch(&actions_key(execution_id)).await?.unwrap_or_default();
        let observations: Vec<Observation> = self
            .fetch(&observations_key(execution_id))
            .await?
            .unwrap_or_default();

        if record.is_none() && thoughts.is_empty() && actions.is_empty() && observations.is_empty() {
            return Ok(None);
        }

        let mut pad = Scratchpad::new(execution_id, "");
        let entry_steps = thoughts.len().max(actions.len()).max(observations.len()) as u32;

        match record {
            Some(record) => {
                pad.original_input = record.original_input;
                pad.started_at = record.started_at;
                pad.current_step = record.current_step.max(entry_steps);
                pad.is_completed = record.is_completed;
                pad.final_answer = record.final_answer;
                pad.stop_reason = record.stop_reason;
                pad.completed_at = record.completed_at;
            }
            None => {
                if let Some(first) = thoughts.first() {
                    pad.started_at = first.created_at;
                } else if let Some(first) = actions.first() {
                    pad.started_at = first.created_at;
                }
                pad.current_step = entry_steps;
            }
        }

        pad.thoughts = thoughts;
        pad.actions = actions;
        pad.observations = observations;

        if !pad.is_completed {
            if let Some(answer) = pad
                .actions
                .iter()
                .rev()
                .find(|a| a.is_final_answer)
                .and_then(|a| a.final_answer.clone())
            {
                pad.complete(answer, StopReason::FinalAnswer);
            }
        }

        debug!(
            execution_id,
            thoughts = pad.thoughts.len(),
            actions = pad.actions.len(),
            observations = pad.observations.len(),
            "Retrieved scratchpad"
        );
        Ok(Some(pad))
    }

    /// Remove everything stored for an execution.
    pub async fn clear(&self, execution_id: &str) -> Result<(), MemoryError> {
        for key in [
            thoughts_key(execution_id),
            actions_key(execution_id),
            observations_key(execution_id),
            record_key(execution_id),
        ] {
            self.store.remove(&key).await?;
        }
        self.recent.write().await.retain(|id| id != execution_id);
        self.thought_window
            .write()
            .await
            .retain(|t| t.execution_id != execution_id);
        debug!(execution_id, "Cleared execution memory");
        Ok(())
    }

    /// Most recent thoughts across recently started executions, newest first.
    pub async fn recent_thoughts(&self, count: usize) -> Result<Vec<Thought>, MemoryError> {
        let ids: Vec<String> = self.recent.read().await.iter().cloned().collect();
        let mut all = Vec::new();
        for id in ids {
            if let Some(thoughts) = self.fetch::<Vec<Thought>>(&thoughts_key(&id)).await? {
                all.extend(thoughts);
            }
        }
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(count);
        Ok(all)
    }

    /// Whether any of the last `window` stored thoughts is at least
    /// `threshold` similar (word Jaccard) to `text`. Reads the in-process
    /// window only; expired thoughts are skipped.
    pub async fn has_similar_thought(&self, text: &str, threshold: f64, window: usize) -> bool {
        let thoughts = self.thought_window.read().await;
        for thought in thoughts
            .iter()
            .filter(|t| t.stored_at.elapsed() < self.ttl)
            .take(window)
        {
            let similarity = text_similarity(text, &thought.content);
            if similarity >= threshold {
                debug!(similarity, thought = %thought.content, "Found similar thought");
                return true;
            }
        }
        false
    }

    async fn append<T: Serialize>(&self, key: &str, item: &T) -> Result<(), MemoryError> {
        let mut items: Vec<serde_json::Value> = self.fetch(key).await?.unwrap_or_default();
        items.push(serde_json::to_value(item).map_err(|e| MemoryError::Serialization(e.to_string()))?);
        self.put(key, &items).await
    }

    async fn fetch<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, MemoryError> {
        match self.store.get(key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| MemoryError::Serialization(format!("{key}: {e}"))),
            None => Ok(None),
        }
    }

    async fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), MemoryError> {
        let value = serde_json::to_value(value).map_err(|e| MemoryError::Serialization(e.to_string()))?;
        self.store.set(key, value, Some(self.ttl)).await
    }
}

fn thoughts_key(execution_id: &str) -> String {
    format!("thoughts_{execution_id}")
}

fn actions_key(execution_id: &str) -> String {
    format!("actions_{execution_id}")
}

fn observations_key(execution_id: &str) -> String {
    format!("observations_{execution_id}")
}

fn record_key(execution_id: &str) -> String {
    format!("execution_{execution_id}")
}

/// Jaccard similarity of the lowercase whitespace-separated word sets.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let words = |s: &str| -> HashSet<String> { s.to_lowercase().split_whitespace().map(String::from).collect() };
    let (wa, wb) = (words(a), words(b));
    let union = wa.union(&wb).count();
    if union == 0 {
        return 0.0;
    }
    wa.intersection(&wb).count() as f64 / union as f64
}
