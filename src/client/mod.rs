use crate::server::AGENT_CARD_PATH;
use crate::types::{
    AgentCard, JsonRpcRequest, JsonRpcResponse, Message, MessageSendParams, Task, TaskIdParams,
    TaskQueryParams, TaskState,
};
use reqwest::Client as ReqwestClient;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::{debug, instrument, trace};


pub mod errors;
pub mod streaming;

pub use errors::{ClientError, RpcError};
pub use streaming::{StreamingResponse, StreamingResponseStream};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Applied to each HTTP request, including discovery.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn http_client(&self) -> Result<ReqwestClient, ClientError> {
        ReqwestClient::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ClientError::Communication(format!("failed to create HTTP client: {}", e)))
    }
}

/// Where the agent card of `base_url` lives. URLs already pointing at an
/// `agent.json` document are used as-is.
pub fn agent_card_url(base_url: &str) -> String {
    if base_url.ends_with("agent.json") {
        base_url.to_string()
    } else {
        format!("{}{}", base_url.trim_end_matches('/'), AGENT_CARD_PATH)
    }
}

/// Fetches and parses a JSON document, reporting every failure as discovery.
pub(crate) async fn fetch_discovery_document(
    http_client: &ReqwestClient,
    url: &str,
) -> Result<Value, ClientError> {
    let discovery = |reason: String| ClientError::Discovery {
        url: url.to_string(),
        reason,
    };

    let response = http_client
        .get(url)
        .send()
        .await
        .map_err(|e| discovery(e.to_string()))?;
    if !response.status().is_success() {
        return Err(discovery(format!("HTTP {}", response.status())));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| discovery(format!("malformed JSON: {}", e)))
}

/// Fetches the agent card published by the agent at `base_url`.
#[instrument(skip(config))]
pub async fn discover(base_url: &str, config: &ClientConfig) -> Result<AgentCard, ClientError> {
    let url = agent_card_url(base_url);
    let http_client = config.http_client()?;
    let document = fetch_discovery_document(&http_client, &url).await?;
    serde_json::from_value(document).map_err(|e| ClientError::Discovery {
        url,
        reason: format!("not an agent card: {}", e),
    })
}

/// Sends `query` to the agent described by `card` and returns its textual reply.
#[instrument(skip(card, query, config), fields(agent = %card.name))]
pub async fn send(card: &AgentCard, query: &str, config: &ClientConfig) -> Result<String, ClientError> {
    let client = A2aClient::from_card(card, config)?;
    let task = client.send_message(query).await?;
    reply_text(&task)
}

/// Text of the first part of a completed task's status message.
pub fn reply_text(task: &Task) -> Result<String, ClientError> {
    match task.status.state {
        TaskState::Completed => task.status_text().map(str::to_string).ok_or_else(|| {
            ClientError::Protocol(format!("completed task {} carries no text reply", task.id))
        }),
        state if state.is_terminal() => Err(ClientError::TaskFailed {
            task_id: task.id.clone(),
            state,
            reason: task.status_text().unwrap_or("no reason given").to_string(),
        }),
        state => Err(ClientError::Protocol(format!(
            "task {} is {} rather than terminal",
            task.id, state
        ))),
    }
}

/// A2A Client for interacting with A2A-compatible servers
pub struct A2aClient {
    http_client: ReqwestClient,
    url: String,
    request_id: AtomicI64,
}

impl A2aClient {
    /// Create a new A2A client with the specified endpoint URL
    pub fn new(url: &str) -> Result<Self, ClientError> {
        Self::with_config(url, &ClientConfig::default())
    }

    pub fn with_config(url: &str, config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            http_client: config.http_client()?,
            url: url.to_string(),
            request_id: AtomicI64::new(1),
        })
    }

    /// A client bound to the endpoint a card advertises.
    pub fn from_card(card: &AgentCard, config: &ClientConfig) -> Result<Self, ClientError> {
        Self::with_config(&card.url, config)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn next_request_id(&self) -> i64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) async fn post_jsonrpc(
        &self,
        method: &str,
        params: Value,
        accept: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let request = JsonRpcRequest::new(self.next_request_id(), method, params);
        trace!(?request, "Sending JSON-RPC request.");

        let response = self
            .http_client
            .post(&self.url)
            .header(reqwest::header::ACCEPT, accept)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Communication(format!(
                "request failed with status: {}",
                response.status()
            )));
        }
        Ok(response)
    }

    /// Send a JSON-RPC request and receive a response
    async fn send_jsonrpc<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ClientError> {
        let response = self.post_jsonrpc(method, params, "application/json").await?;
        let body = response.text().await?;
        let envelope: JsonRpcResponse<Value> = serde_json::from_str(&body)
            .map_err(|e| ClientError::Protocol(format!("invalid JSON-RPC response: {}", e)))?;

        if let Some(error) = envelope.error {
            debug!(code = error.code, message = %error.message, "Remote agent returned an error.");
            return Err(ClientError::Rpc(error.into()));
        }
        let result = envelope
            .result
            .ok_or_else(|| ClientError::Protocol("JSON-RPC response has no result".to_string()))?;
        serde_json::from_value(result)
            .map_err(|e| ClientError::Protocol(format!("unexpected result shape: {}", e)))
    }

    /// Get agent card from the well-known endpoint of this client's URL
    pub async fn get_agent_card(&self) -> Result<AgentCard, ClientError> {
        let url = agent_card_url(&self.url);
        let document = fetch_discovery_document(&self.http_client, &url).await?;
        serde_json::from_value(document).map_err(|e| ClientError::Discovery {
            url,
            reason: format!("not an agent card: {}", e),
        })
    }

    /// Sends a single-text-part user message and returns the resulting task
    pub async fn send_message(&self, text: &str) -> Result<Task, ClientError> {
        self.send_message_with_params(MessageSendParams::new(Message::user_text(text)))
            .await
    }

    pub async fn send_message_with_params(&self, params: MessageSendParams) -> Result<Task, ClientError> {
        self.send_jsonrpc("message/send", serde_json::to_value(params)?)
            .await
    }

    pub async fn get_task(&self, task_id: &str, history_length: Option<usize>) -> Result<Task, ClientError> {
        let params = TaskQueryParams {
            id: task_id.to_string(),
            history_length,
            metadata: None,
        };
        self.send_jsonrpc("tasks/get", serde_json::to_value(params)?).await
    }

    pub async fn cancel_task(&self, task_id: &str) -> Result<Task, ClientError> {
        let params = TaskIdParams {
            id: task_id.to_string(),
            metadata: None,
        };
        self.send_jsonrpc("tasks/cancel", serde_json::to_value(params)?)
            .await
    }
}
