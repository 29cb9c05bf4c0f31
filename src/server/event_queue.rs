use crate::server::ServerError;
use crate::types::{AgentEvent, Message, TaskState, TaskStatus, TaskStatusUpdateEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

const EVENT_QUEUE_CAPACITY: usize = 32;

/// Ordered channel from an executor to the wire layer.
///
/// The wire layer holds the receiving half and drains events in the order
/// they were enqueued.
#[derive(Debug, Clone)]
pub struct EventQueue {
    sender: mpsc::Sender<AgentEvent>,
}

impl EventQueue {
    pub fn new() -> (Self, mpsc::Receiver<AgentEvent>) {
        Self::with_capacity(EVENT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<AgentEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    pub async fn enqueue_event(&self, event: impl Into<AgentEvent>) -> Result<(), ServerError> {
        let event = event.into();
        let task_id = event.task_id().to_string();
        trace!(%task_id, ?event, "Enqueuing agent event.");
        self.sender.send(event).await.map_err(|_| {
            warn!(%task_id, "Event queue receiver dropped.");
            ServerError::QueueClosed(task_id)
        })
    }
}

/// Publishes status transitions for one task onto an [`EventQueue`].
///
/// Once a terminal state has been published every further update is rejected.
#[derive(Debug)]
pub struct TaskUpdater {
    queue: EventQueue,
    task_id: String,
    context_id: String,
    terminal: AtomicBool,
}

impl TaskUpdater {
    pub fn new(queue: EventQueue, task_id: &str, context_id: &str) -> Self {
        Self {
            queue,
            task_id: task_id.to_string(),
            context_id: context_id.to_string(),
            terminal: AtomicBool::new(false),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::SeqCst)
    }

    /// Builds an agent message scoped to this task.
    pub fn new_agent_message(&self, text: impl Into<String>) -> Message {
        Message::agent_text(text, &self.context_id, &self.task_id)
    }

    pub async fn update_status(
        &self,
        state: TaskState,
        message: Option<Message>,
    ) -> Result<(), ServerError> {
        let final_ = state.is_terminal();
        let already_terminal = if final_ {
            self.terminal.swap(true, Ordering::SeqCst)
        } else {
            self.terminal.load(Ordering::SeqCst)
        };
        if already_terminal {
            warn!(task_id = %self.task_id, %state, "Rejecting status update after terminal state.");
            return Err(ServerError::TaskAlreadyTerminal(self.task_id.clone()));
        }

        debug!(task_id = %self.task_id, %state, final_, "Publishing status update.");
        let event = TaskStatusUpdateEvent::new(
            &self.task_id,
            &self.context_id,
            TaskStatus::new(state, message),
            final_,
        );
        self.queue.enqueue_event(event).await
    }

    pub async fn start_work(&self, message: Option<Message>) -> Result<(), ServerError> {
        self.update_status(TaskState::Working, message).await
    }

    pub async fn complete(&self, message: Option<Message>) -> Result<(), ServerError> {
        self.update_status(TaskState::Completed, message).await
    }

    pub async fn failed(&self, message: Option<Message>) -> Result<(), ServerError> {
        self.update_status(TaskState::Failed, message).await
    }
}
