//! Gemini `generateContent` provider with a function-calling loop.
//!
//! Each model call sees the full session history. When the model asks for
//! tools, the calls are executed, their results appended as function
//! responses and the model is called again, until it answers in text or the
//! round limit is hit.

use crate::bridge::session::{Session, SessionHandle};
use crate::provider::{
    Content, ContentPart, FunctionCall, FunctionResponse, ProviderError, ProviderEvent,
    ProviderEventStream, ReasoningProvider,
};
use crate::tools::ToolSet;
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;
pub const DEFAULT_INSTRUCTION: &str = "You are an expert web crawler. Your primary task is to extract content from URLs provided by the user. Use the available tools to fetch content from the web. Respond with the extracted content or a summary as requested.";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub instruction: String,
    /// Author recorded on emitted events.
    pub agent_name: String,
    pub max_tool_rounds: usize,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            instruction: DEFAULT_INSTRUCTION.to_string(),
            agent_name: crate::bridge::session::DEFAULT_APP_NAME.to_string(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            timeout: Duration::from_secs(120),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

pub struct GeminiProvider {
    client: reqwest::Client,
    config: Arc<GeminiConfig>,
    tools: ToolSet,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig, tools: ToolSet) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        info!(model = %config.model, tools = ?tools.names(), "Creating Gemini provider.");
        Ok(Self {
            client,
            config: Arc::new(config),
            tools,
        })
    }
}

/// Build the JSON request body for the Gemini generateContent API.
pub fn build_request_body(config: &GeminiConfig, tools: &ToolSet, history: &[Content]) -> Value {
    let mut body = json!({
        "system_instruction": {
            "parts": [{"text": config.instruction}]
        },
        "contents": history,
    });
    if !tools.is_empty() {
        body["tools"] = json!([{ "function_declarations": tools.declarations() }]);
    }
    body
}

/// Extracts the first candidate's content from a generateContent response.
pub fn parse_response(response_body: &Value) -> Result<Content, ProviderError> {
    let candidate = response_body
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or_else(|| ProviderError::InvalidResponse("missing candidates in response".to_string()))?;

    let content = candidate.get("content").cloned().ok_or_else(|| {
        let reason = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        ProviderError::InvalidResponse(format!("candidate has no content (finishReason: {})", reason))
    })?;

    serde_json::from_value(content)
        .map_err(|e| ProviderError::InvalidResponse(format!("malformed content: {}", e)))
}

/// State of one provider turn, owned by the event stream.
///
/// Holds the session lock until the stream is dropped. A turn that fails or
/// is dropped before the final response leaves the session history as it
/// was before the turn started.
struct Turn {
    client: reqwest::Client,
    config: Arc<GeminiConfig>,
    tools: ToolSet,
    session: OwnedMutexGuard<Session>,
    history_len: usize,
    pending: VecDeque<ProviderEvent>,
    rounds: usize,
    done: bool,
    completed: bool,
}

impl Drop for Turn {
    fn drop(&mut self) {
        if !self.completed {
            self.rollback();
        }
    }
}

impl Turn {
    fn rollback(&mut self) {
        if self.session.history.len() > self.history_len {
            debug!(
                session_id = %self.session.id,
                dropped = self.session.history.len() - self.history_len,
                "Rolling back unfinished turn."
            );
            self.session.history.truncate(self.history_len);
        }
    }

    async fn call_model(&self) -> Result<Content, ProviderError> {
        let body = build_request_body(&self.config, &self.tools, &self.session.history);
        let response = self
            .client
            .post(self.config.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let response_body: Value = response.json().await?;
        parse_response(&response_body)
    }

    async fn call_tool(&self, call: &FunctionCall) -> Value {
        match self.tools.call(&call.name, call.args.clone()).await {
            Ok(Value::Object(map)) => Value::Object(map),
            Ok(other) => json!({ "result": other }),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed.");
                json!({ "error": e.to_string() })
            }
        }
    }

    /// One model round. Queues the events it produced.
    async fn step(&mut self) -> Result<(), ProviderError> {
        let content = self.call_model().await?;

        let calls: Vec<FunctionCall> = content.function_calls().cloned().collect();
        if calls.is_empty() {
            debug!(rounds = self.rounds, "Model produced its final response.");
            self.session.append(content.clone());
            self.pending
                .push_back(ProviderEvent::final_response(&self.config.agent_name, Some(content)));
            self.done = true;
            self.completed = true;
            return Ok(());
        }

        if self.rounds >= self.config.max_tool_rounds {
            return Err(ProviderError::MaxToolRounds(self.config.max_tool_rounds));
        }
        self.rounds += 1;
        self.session.append(content.clone());
        self.pending
            .push_back(ProviderEvent::intermediate(&self.config.agent_name, Some(content)));

        let mut parts = Vec::with_capacity(calls.len());
        for call in calls {
            debug!(tool = %call.name, round = self.rounds, "Executing tool call.");
            let response = self.call_tool(&call).await;
            parts.push(ContentPart {
                function_response: Some(FunctionResponse {
                    name: call.name,
                    response,
                }),
                ..ContentPart::default()
            });
        }
        let tool_content = Content {
            role: "user".to_string(),
            parts,
        };
        self.session.append(tool_content.clone());
        self.pending
            .push_back(ProviderEvent::intermediate(&self.config.agent_name, Some(tool_content)));
        Ok(())
    }
}

#[async_trait]
impl ReasoningProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, session, message))]
    async fn run(
        &self,
        session: SessionHandle,
        message: Content,
    ) -> Result<ProviderEventStream, ProviderError> {
        let mut session = session.lock_owned().await;
        debug!(session_id = %session.id, "Starting Gemini turn.");
        let history_len = session.history.len();
        session.append(message);

        let turn = Turn {
            client: self.client.clone(),
            config: self.config.clone(),
            tools: self.tools.clone(),
            session,
            history_len,
            pending: VecDeque::new(),
            rounds: 0,
            done: false,
            completed: false,
        };

        let events = stream::unfold(turn, |mut turn| async move {
            loop {
                if let Some(event) = turn.pending.pop_front() {
                    return Some((Ok(event), turn));
                }
                if turn.done {
                    return None;
                }
                if let Err(e) = turn.step().await {
                    warn!(error = %e, "Gemini turn failed.");
                    turn.done = true;
                    turn.pending.clear();
                    turn.rollback();
                    return Some((Err(e), turn));
                }
            }
        });
        Ok(events.boxed())
    }
}
