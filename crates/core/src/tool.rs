//! Tool traits: the abstraction over agent capabilities.
//!
//! The engine never knows how a tool works. It sees a catalog
//! ([`ToolRegistry`]), an invocation surface ([`ToolExecutor`]) and the
//! result type. Concrete tools implement [`Tool`] and are collected by a
//! registry implementation in `reagent-tools`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;
use crate::value::{ParamValue, Parameters};

/// Declaration of one tool parameter, shown to the model in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ParamValue>,
}

impl ToolParameter {
    pub fn required(name: &str, param_type: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: &str, param_type: &str, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_default(mut self, value: impl Into<ParamValue>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Catalog entry for a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
}

impl ToolDescriptor {
    pub fn required_parameters(&self) -> impl Iterator<Item = &ToolParameter> {
        self.parameters.iter().filter(|p| p.required)
    }
}

/// What a tool returns.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub is_success: bool,
    /// Structured payload, if any.
    pub data: Option<serde_json::Value>,
    /// Human-readable summary. Preferred over `data` when rendering.
    pub summary: Option<String>,
    pub error: Option<ToolError>,
}

impl ToolResult {
    pub fn success(summary: impl Into<String>) -> Self {
        Self {
            is_success: true,
            data: None,
            summary: Some(summary.into()),
            error: None,
        }
    }

    pub fn with_data(data: serde_json::Value) -> Self {
        Self {
            is_success: true,
            data: Some(data),
            summary: None,
            error: None,
        }
    }

    pub fn failure(error: ToolError) -> Self {
        Self {
            is_success: false,
            data: None,
            summary: None,
            error: Some(error),
        }
    }

    pub fn and_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}

/// Ambient information handed to a tool invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolExecutionContext {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub conversation_id: Option<String>,
    pub timeout: Duration,
    /// Free-form values such as `react_execution_id` or `react_step_number`.
    #[serde(default)]
    pub custom: BTreeMap<String, serde_json::Value>,
}

/// A single capability the agent can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable identifier (e.g., "web_search").
    fn id(&self) -> &str;

    /// Display name. Defaults to the id.
    fn name(&self) -> &str {
        self.id()
    }

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    fn category(&self) -> &str {
        "general"
    }

    fn parameters(&self) -> Vec<ToolParameter>;

    async fn execute(
        &self,
        parameters: &Parameters,
        context: &ToolExecutionContext,
    ) -> std::result::Result<ToolResult, ToolError>;

    /// Build the catalog entry for this tool.
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            id: self.id().to_string(),
            name: self.name().to_string(),
            description: self.description().to_string(),
            category: self.category().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Read side of the tool catalog.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    async fn list_enabled_tools(&self) -> Vec<ToolDescriptor>;

    /// Look up a tool. `Ok(None)` means "not registered".
    async fn get_tool(&self, tool_id: &str) -> std::result::Result<Option<ToolDescriptor>, ToolError>;

    async fn is_registered(&self, tool_id: &str) -> bool;

    async fn is_enabled(&self, tool_id: &str) -> bool;
}

/// Invocation side of the tool catalog.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(
        &self,
        tool_id: &str,
        parameters: Parameters,
        context: ToolExecutionContext,
        cancel: CancellationToken,
    ) -> std::result::Result<ToolResult, ToolError>;
}
