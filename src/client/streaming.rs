use crate::client::{A2aClient, ClientError};
use crate::types::{AgentEvent, JsonRpcResponse, Message, MessageSendParams, Task, TaskStatusUpdateEvent};
use eventsource_stream::Eventsource;
use futures_util::stream::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;

/// Response from a streaming message operation
#[derive(Debug, Clone, PartialEq)]
pub enum StreamingResponse {
    /// Task snapshot
    Task(Task),
    /// Intermediate status update
    Status(TaskStatusUpdateEvent),
    /// Final status update (stream end)
    Final(TaskStatusUpdateEvent),
}

pub type StreamingResponseStream =
    Pin<Box<dyn Stream<Item = Result<StreamingResponse, ClientError>> + Send>>;

impl A2aClient {
    /// Sends a message with `message/stream` and decodes the SSE responses.
    pub async fn stream_message(&self, text: &str) -> Result<StreamingResponseStream, ClientError> {
        let params = MessageSendParams::new(Message::user_text(text));
        let response = self
            .post_jsonrpc("message/stream", serde_json::to_value(params)?, "text/event-stream")
            .await?;

        let events = response.bytes_stream().eventsource().map(|event| match event {
            Ok(event) => decode_event(&event.data),
            Err(e) => Err(ClientError::Communication(format!("SSE stream error: {}", e))),
        });
        Ok(Box::pin(events))
    }
}

/// Decodes the `data` of one server-sent event.
pub fn decode_event(data: &str) -> Result<StreamingResponse, ClientError> {
    let envelope: JsonRpcResponse<Value> = serde_json::from_str(data)
        .map_err(|e| ClientError::Protocol(format!("invalid SSE payload: {}", e)))?;
    if let Some(error) = envelope.error {
        return Err(ClientError::Rpc(error.into()));
    }
    let result = envelope
        .result
        .ok_or_else(|| ClientError::Protocol("SSE payload has no result".to_string()))?;

    match serde_json::from_value::<AgentEvent>(result) {
        Ok(AgentEvent::StatusUpdate(update)) if update.final_ => Ok(StreamingResponse::Final(update)),
        Ok(AgentEvent::StatusUpdate(update)) => Ok(StreamingResponse::Status(update)),
        Ok(AgentEvent::Task(task)) => Ok(StreamingResponse::Task(task)),
        Err(e) => Err(ClientError::Protocol(format!("unexpected stream event: {}", e))),
    }
}
