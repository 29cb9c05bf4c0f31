//! Tools a reasoning provider may call during a turn.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

mod scrape_tool;

pub use scrape_tool::{ContentFetcher, FirecrawlFetcher, ScrapeTool, FIRECRAWL_API_BASE};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ToolError {
    #[error("Tool '{0}' not found")]
    NotFound(String),
    #[error("Invalid parameters for tool '{0}': {1}")]
    InvalidParams(String, String),
    #[error("Tool execution failed for '{0}': {1}")]
    ExecutionFailed(String, String),
    #[error("Tool configuration error for '{0}': {1}")]
    ConfigError(String, String),
}

#[async_trait]
pub trait Tool: Send + Sync + 'static {
    /// Returns the unique name of the tool.
    fn name(&self) -> &str;
    /// Returns a description the model uses to decide when to call it.
    fn description(&self) -> &str;
    /// JSON schema of the parameters object.
    fn parameters(&self) -> Value;
    async fn execute(&self, params: Value) -> Result<Value, ToolError>;
}

/// The tools offered to a provider for one agent.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Function declarations in the shape the model API expects.
    pub fn declarations(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters(),
                })
            })
            .collect()
    }

    pub async fn call(&self, name: &str, params: Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(params).await
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet").field("tools", &self.names()).finish()
    }
}
