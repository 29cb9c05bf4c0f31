use crate::bridge::{StatusEvent, TaskBridge};
use crate::server::event_queue::{EventQueue, TaskUpdater};
use crate::server::executor::{AgentExecutor, RequestContext};
use crate::server::ServerError;
use crate::types::Task;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub const WORKING_FALLBACK_TEXT: &str = "Agent is processing...";
pub const COMPLETED_FALLBACK_TEXT: &str = "No content received.";

/// Runs A2A requests through a [`TaskBridge`], keyed by the task's context id.
pub struct BridgeExecutor {
    bridge: Arc<TaskBridge>,
}

impl BridgeExecutor {
    pub fn new(bridge: Arc<TaskBridge>) -> Self {
        Self { bridge }
    }

    async fn run(&self, query: &str, updater: &TaskUpdater) -> Result<(), ServerError> {
        let mut events = self.bridge.invoke(query, updater.context_id());

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| ServerError::TaskExecutionFailed(e.to_string()))?;
            match event {
                StatusEvent::Working { text } => {
                    let text = non_empty_or(text, WORKING_FALLBACK_TEXT);
                    updater.start_work(Some(updater.new_agent_message(text))).await?;
                }
                StatusEvent::Completed { text } => {
                    let text = non_empty_or(text, COMPLETED_FALLBACK_TEXT);
                    updater.complete(Some(updater.new_agent_message(text))).await?;
                    info!("Task completed.");
                    break;
                }
                StatusEvent::Failed { reason } => {
                    return Err(ServerError::TaskExecutionFailed(reason));
                }
            }
        }

        if updater.is_terminal() {
            Ok(())
        } else {
            Err(ServerError::TaskExecutionFailed(
                "bridge stream ended without a completed event".to_string(),
            ))
        }
    }
}

fn non_empty_or(text: String, fallback: &str) -> String {
    if text.is_empty() {
        fallback.to_string()
    } else {
        text
    }
}

#[async_trait]
impl AgentExecutor for BridgeExecutor {
    #[instrument(skip_all, fields(task_id = %context.task_id, context_id = %context.context_id))]
    async fn execute(
        &self,
        context: &RequestContext,
        event_queue: &EventQueue,
    ) -> Result<(), ServerError> {
        let query = context.user_input();

        let task = match &context.current_task {
            Some(task) => task.clone(),
            None => {
                let message = context.message.as_ref().ok_or_else(|| {
                    ServerError::InvalidParameters("request carries no message".to_string())
                })?;
                let task = Task::from_message(message);
                debug!(task_id = %task.id, "Publishing new task.");
                event_queue.enqueue_event(task.clone()).await?;
                task
            }
        };

        let updater = TaskUpdater::new(event_queue.clone(), &task.id, &task.context_id);
        match self.run(&query, &updater).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(error = %e, "Bridged task failed.");
                if !updater.is_terminal() {
                    let reason = updater.new_agent_message(format!("An error occurred: {}", e));
                    if let Err(publish_err) = updater.failed(Some(reason)).await {
                        warn!(error = %publish_err, "Could not publish failed state.");
                    }
                }
                Err(e)
            }
        }
    }

    async fn cancel(
        &self,
        context: &RequestContext,
        _event_queue: &EventQueue,
    ) -> Result<Option<Task>, ServerError> {
        info!(task_id = %context.task_id, "Rejecting cancel request.");
        Err(ServerError::UnsupportedOperation(
            "cancel is not supported by this agent".to_string(),
        ))
    }
}
