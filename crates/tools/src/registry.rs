//! In-process tool catalog.
//!
//! Implements both [`ToolRegistry`] (what the prompt builder and validator
//! see) and [`ToolExecutor`] (what the action executor calls). Tools can be
//! disabled at runtime without unregistering them; a disabled tool stays
//! registered but is hidden from the catalog and refuses execution.

use async_trait::async_trait;
use reagent_core::error::ToolError;
use reagent_core::tool::{
    Tool, ToolDescriptor, ToolExecutionContext, ToolExecutor, ToolRegistry, ToolResult,
};
use reagent_core::value::Parameters;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct ToolCatalog {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    disabled: RwLock<HashSet<String>>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            disabled: RwLock::new(HashSet::new()),
        }
    }

    /// Register a tool. Replaces any existing tool with the same id.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let id = tool.id().to_string();
        debug!(tool = %id, "Registered tool");
        self.tools.insert(id, tool);
    }

    /// Disable a tool while the catalog is still being built.
    pub fn disable_now(&mut self, tool_id: &str) {
        self.disabled.get_mut().insert(tool_id.to_string());
    }

    pub async fn disable(&self, tool_id: &str) {
        info!(tool = %tool_id, "Disabling tool");
        self.disabled.write().await.insert(tool_id.to_string());
    }

    pub async fn enable(&self, tool_id: &str) {
        info!(tool = %tool_id, "Enabling tool");
        self.disabled.write().await.remove(tool_id);
    }

    /// Every registered tool id, enabled or not.
    pub fn ids(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolRegistry for ToolCatalog {
    async fn list_enabled_tools(&self) -> Vec<ToolDescriptor> {
        let disabled = self.disabled.read().await;
        self.tools
            .iter()
            .filter(|(id, _)| !disabled.contains(*id))
            .map(|(_, tool)| tool.descriptor())
            .collect()
    }

    async fn get_tool(&self, tool_id: &str) -> Result<Option<ToolDescriptor>, ToolError> {
        Ok(self.tools.get(tool_id).map(|t| t.descriptor()))
    }

    async fn is_registered(&self, tool_id: &str) -> bool {
        self.tools.contains_key(tool_id)
    }

    async fn is_enabled(&self, tool_id: &str) -> bool {
        self.tools.contains_key(tool_id) && !self.disabled.read().await.contains(tool_id)
    }
}

#[async_trait]
impl ToolExecutor for ToolCatalog {
    async fn execute(
        &self,
        tool_id: &str,
        parameters: Parameters,
        context: ToolExecutionContext,
        cancel: CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(tool_id)
            .ok_or_else(|| ToolError::NotFound(tool_id.to_string()))?;
        if self.disabled.read().await.contains(tool_id) {
            return Err(ToolError::Disabled(tool_id.to_string()));
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ToolError::Cancelled(tool_id.to_string())),
            result = tool.execute(&parameters, &context) => result,
        }
    }
}
