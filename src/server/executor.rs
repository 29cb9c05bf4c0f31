use crate::server::event_queue::EventQueue;
use crate::server::ServerError;
use crate::types::{Message, Task};
use async_trait::async_trait;
use uuid::Uuid;

/// Inbound request as seen by an agent executor.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub message: Option<Message>,
    pub current_task: Option<Task>,
    pub task_id: String,
    pub context_id: String,
}

impl RequestContext {
    /// Binds an inbound message to a task id and context id.
    ///
    /// Ids come from the existing task first, then from the message, and are
    /// generated otherwise. The stored message carries the resolved ids.
    pub fn new(mut message: Message, current_task: Option<Task>) -> Self {
        let task_id = current_task
            .as_ref()
            .map(|t| t.id.clone())
            .or_else(|| message.task_id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let context_id = current_task
            .as_ref()
            .map(|t| t.context_id.clone())
            .or_else(|| message.context_id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        message.task_id = Some(task_id.clone());
        message.context_id = Some(context_id.clone());

        Self {
            message: Some(message),
            current_task,
            task_id,
            context_id,
        }
    }

    /// Context for an operation on an existing task with no new message.
    pub fn for_task(task: Task) -> Self {
        Self {
            message: None,
            task_id: task.id.clone(),
            context_id: task.context_id.clone(),
            current_task: Some(task),
        }
    }

    /// Concatenated text of the inbound message, empty when there is none.
    pub fn user_input(&self) -> String {
        self.message
            .as_ref()
            .map(Message::text_content)
            .unwrap_or_default()
    }
}

/// Adapter between the A2A wire layer and an agent implementation.
#[async_trait]
pub trait AgentExecutor: Send + Sync + 'static {
    /// Runs the agent for one request, publishing task and status events.
    async fn execute(
        &self,
        context: &RequestContext,
        event_queue: &EventQueue,
    ) -> Result<(), ServerError>;

    /// Requests cancellation of the task in `context`.
    async fn cancel(
        &self,
        context: &RequestContext,
        event_queue: &EventQueue,
    ) -> Result<Option<Task>, ServerError>;
}
