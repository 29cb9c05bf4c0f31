use crate::server::services::task_service::{RunningTask, TaskService};
use crate::server::ServerError;
use crate::types::{JsonRpcResponse, MessageSendParams};
use futures_util::Stream;
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, instrument, warn, Instrument};

pub type SseStream = Pin<Box<dyn Stream<Item = Result<String, Infallible>> + Send>>;

/// Service for handling streaming tasks
pub struct StreamingService {
    task_service: Arc<TaskService>,
}

impl StreamingService {
    pub fn new(task_service: Arc<TaskService>) -> Self {
        info!("Creating new StreamingService.");
        Self { task_service }
    }

    /// Handles `message/stream`.
    ///
    /// Every executor event is applied to the task store and then forwarded
    /// as one server-sent event. The stream closes after the final event.
    #[instrument(skip(self, request_id, params))]
    pub async fn stream_message(
        &self,
        request_id: Value,
        params: MessageSendParams,
    ) -> Result<SseStream, ServerError> {
        let running = self.task_service.start_task(&params).await?;
        let (tx, rx) = mpsc::channel(32);
        let task_service = self.task_service.clone();
        let span = tracing::info_span!("sse_stream_task", task_id = %running.context.task_id);

        tokio::spawn(
            async move {
                let RunningTask {
                    context,
                    mut events,
                    handle,
                } = running;
                let mut finished = false;
                let mut client_gone = false;

                // Keep applying events after a disconnect so the task still ends terminal.
                while let Some(event) = events.recv().await {
                    if let Err(e) = task_service.apply_event(&event).await {
                        error!(error = %e, "Failed to apply streamed event.");
                        let _ = tx
                            .send(Ok(error_frame(request_id.clone(), &e)))
                            .await;
                        finished = true;
                        break;
                    }
                    finished |= event.is_final();
                    if !client_gone {
                        let frame = sse_frame(&JsonRpcResponse::success(request_id.clone(), &event));
                        if tx.send(Ok(frame)).await.is_err() {
                            info!("SSE client disconnected. Draining remaining events.");
                            client_gone = true;
                        } else {
                            debug!(final_ = event.is_final(), "Forwarded event to SSE client.");
                        }
                    }
                    if finished {
                        break;
                    }
                }
                drop(events);

                match handle.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) if !finished => {
                        let _ = tx.send(Ok(error_frame(request_id.clone(), &e))).await;
                    }
                    Ok(Err(e)) => warn!(error = %e, "Executor failed after the final event."),
                    Err(e) => {
                        let err = ServerError::Internal(format!("executor task aborted: {}", e));
                        let _ = tx.send(Ok(error_frame(request_id.clone(), &err))).await;
                    }
                }
                info!(task_id = %context.task_id, "SSE streaming task finished.");
            }
            .instrument(span),
        );

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

fn sse_frame<T: Serialize>(payload: &T) -> String {
    match serde_json::to_string(payload) {
        Ok(json) => format!("data: {}\n\n", json),
        Err(e) => {
            error!(error = %e, "Failed to serialize SSE payload.");
            "data: {\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{\"code\":-32603,\"message\":\"failed to serialize event\"}}\n\n"
                .to_string()
        }
    }
}

fn error_frame(request_id: Value, err: &ServerError) -> String {
    sse_frame(&JsonRpcResponse::<Value>::failure(request_id, err.to_jsonrpc_error()))
}
