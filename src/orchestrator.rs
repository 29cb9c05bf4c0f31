//! Calls other A2A agents by name, resolving them through a registry.
//!
//! The registry is any URL whose `/.well-known/agent.json` serves either a
//! single agent card or an array of cards.

use crate::client::{self, agent_card_url, fetch_discovery_document, ClientConfig, ClientError};
use crate::tools::{Tool, ToolError};
use crate::types::AgentCard;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("agent registry unavailable: {0}")]
    Registry(#[source] ClientError),

    #[error("no agent named {0:?} in the registry")]
    AgentNotFound(String),

    #[error("call to agent {agent:?} failed: {source}")]
    Call {
        agent: String,
        #[source]
        source: ClientError,
    },
}

pub struct Orchestrator {
    registry_url: String,
    client_config: ClientConfig,
}

impl Orchestrator {
    pub fn new(registry_url: &str, client_config: ClientConfig) -> Self {
        Self {
            registry_url: registry_url.to_string(),
            client_config,
        }
    }

    pub fn registry_url(&self) -> &str {
        &self.registry_url
    }

    /// Fetches the registry's agent cards. Nothing is cached.
    #[instrument(skip(self), fields(registry = %self.registry_url))]
    pub async fn list_agents(&self) -> Result<Vec<AgentCard>, OrchestratorError> {
        let url = agent_card_url(&self.registry_url);
        let http_client = reqwest::Client::builder()
            .timeout(self.client_config.timeout)
            .build()
            .map_err(|e| OrchestratorError::Registry(ClientError::Communication(e.to_string())))?;

        let document = fetch_discovery_document(&http_client, &url)
            .await
            .map_err(OrchestratorError::Registry)?;

        let cards = match document {
            Value::Array(_) => serde_json::from_value::<Vec<AgentCard>>(document),
            other => serde_json::from_value::<AgentCard>(other).map(|card| vec![card]),
        }
        .map_err(|e| {
            OrchestratorError::Registry(ClientError::Discovery {
                url: url.clone(),
                reason: format!("registry returned no agent cards: {}", e),
            })
        })?;

        info!(count = cards.len(), "Listed registered agents.");
        Ok(cards)
    }

    /// Sends `message` to the first registered agent named `agent_name` and
    /// returns its reply text.
    #[instrument(skip(self, message))]
    pub async fn call_agent(&self, agent_name: &str, message: &str) -> Result<String, OrchestratorError> {
        let cards = self.list_agents().await?;
        let card = cards
            .into_iter()
            .find(|card| card.name == agent_name)
            .ok_or_else(|| OrchestratorError::AgentNotFound(agent_name.to_string()))?;

        debug!(url = %card.url, "Calling agent.");
        client::send(&card, message, &self.client_config)
            .await
            .map_err(|source| {
                warn!(error = %source, "Agent call failed.");
                OrchestratorError::Call {
                    agent: agent_name.to_string(),
                    source,
                }
            })
    }
}

/// `list_agents` exposed to a reasoning provider.
pub struct ListAgentsTool {
    orchestrator: Arc<Orchestrator>,
}

impl ListAgentsTool {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Tool for ListAgentsTool {
    fn name(&self) -> &str {
        "list_agents"
    }

    fn description(&self) -> &str {
        "Lists the agents available in the registry with their descriptions and skills."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: Value) -> Result<Value, ToolError> {
        let cards = self
            .orchestrator
            .list_agents()
            .await
            .map_err(|e| ToolError::ExecutionFailed(self.name().to_string(), e.to_string()))?;
        let agents = serde_json::to_value(cards)
            .map_err(|e| ToolError::ExecutionFailed(self.name().to_string(), e.to_string()))?;
        Ok(json!({ "agents": agents }))
    }
}

/// `call_agent` exposed to a reasoning provider.
pub struct CallAgentTool {
    orchestrator: Arc<Orchestrator>,
}

impl CallAgentTool {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Tool for CallAgentTool {
    fn name(&self) -> &str {
        "call_agent"
    }

    fn description(&self) -> &str {
        "Sends a message to a registered agent by name and returns its reply."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent_name": {"type": "string"},
                "message": {"type": "string"}
            },
            "required": ["agent_name", "message"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let field = |key: &str| {
            params.get(key).and_then(Value::as_str).ok_or_else(|| {
                ToolError::InvalidParams(self.name().to_string(), format!("Missing '{}' parameter", key))
            })
        };
        let agent_name = field("agent_name")?;
        let message = field("message")?;

        let reply = self
            .orchestrator
            .call_agent(agent_name, message)
            .await
            .map_err(|e| ToolError::ExecutionFailed(self.name().to_string(), e.to_string()))?;
        Ok(json!({ "agent": agent_name, "reply": reply }))
    }
}
