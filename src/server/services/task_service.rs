use crate::server::event_queue::EventQueue;
use crate::server::executor::{AgentExecutor, RequestContext};
use crate::server::repositories::task_repository::TaskRepository;
use crate::server::ServerError;
use crate::types::{AgentEvent, MessageSendParams, Task, TaskIdParams, TaskQueryParams, TaskState};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

/// An executor run in flight: its request context, the receiving end of its
/// event queue and the handle of the spawned `execute` call.
pub struct RunningTask {
    pub context: RequestContext,
    pub events: mpsc::Receiver<AgentEvent>,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

/// Drives an [`AgentExecutor`] for each inbound request and keeps the task
/// store in step with the events it publishes.
pub struct TaskService {
    task_repository: Arc<dyn TaskRepository>,
    executor: Arc<dyn AgentExecutor>,
    /// Context id to the task whose executor is running in it.
    active_contexts: Arc<DashMap<String, String>>,
}

impl TaskService {
    pub fn new(task_repository: Arc<dyn TaskRepository>, executor: Arc<dyn AgentExecutor>) -> Self {
        info!("Creating new TaskService.");
        Self {
            task_repository,
            executor,
            active_contexts: Arc::new(DashMap::new()),
        }
    }

    pub fn repository(&self) -> &Arc<dyn TaskRepository> {
        &self.task_repository
    }

    /// Resolves the request context and spawns the executor.
    ///
    /// A message naming an existing task continues it, unless that task is
    /// already terminal. A context runs one task at a time: a new task in a
    /// context whose executor is still running is rejected.
    #[instrument(skip(self, params), fields(message_id = %params.message.message_id))]
    pub async fn start_task(&self, params: &MessageSendParams) -> Result<RunningTask, ServerError> {
        let current_task = match params.message.task_id.as_deref() {
            Some(task_id) => {
                let task = self
                    .task_repository
                    .get_task(task_id)
                    .await?
                    .ok_or_else(|| ServerError::TaskNotFound(task_id.to_string()))?;
                if task.status.state.is_terminal() {
                    warn!(%task_id, state = %task.status.state, "Follow-up message for terminal task.");
                    return Err(ServerError::TaskAlreadyTerminal(task_id.to_string()));
                }
                if let Some(context_id) = params.message.context_id.as_deref() {
                    if context_id != task.context_id {
                        return Err(ServerError::InvalidParameters(format!(
                            "contextId {} does not match task {}",
                            context_id, task_id
                        )));
                    }
                }
                Some(task)
            }
            None => None,
        };

        let mut context = RequestContext::new(params.message.clone(), current_task);
        self.claim_context(&context)?;
        if let (Some(task), Some(message)) = (context.current_task.as_mut(), context.message.as_ref()) {
            debug!(task_id = %task.id, "Appending follow-up message to task history.");
            task.history.push(message.clone());
            if let Err(e) = self.task_repository.save_task(task).await {
                self.active_contexts
                    .remove_if(&task.context_id, |_, active| *active == task.id);
                return Err(e);
            }
        }

        let (queue, events) = EventQueue::new();
        let executor = self.executor.clone();
        let exec_context = context.clone();
        let active_contexts = self.active_contexts.clone();
        let handle = tokio::spawn(async move {
            let result = executor.execute(&exec_context, &queue).await;
            if let Err(e) = &result {
                error!(task_id = %exec_context.task_id, error = %e, "Agent executor failed.");
            }
            active_contexts.remove_if(&exec_context.context_id, |_, task_id| {
                *task_id == exec_context.task_id
            });
            result
        });

        info!(task_id = %context.task_id, context_id = %context.context_id, "Executor started.");
        Ok(RunningTask {
            context,
            events,
            handle,
        })
    }

    fn claim_context(&self, context: &RequestContext) -> Result<(), ServerError> {
        match self.active_contexts.entry(context.context_id.clone()) {
            Entry::Occupied(entry) if *entry.get() != context.task_id => {
                warn!(context_id = %context.context_id, active_task = %entry.get(), "Context already has an active task.");
                Err(ServerError::InvalidParameters(format!(
                    "context {} already has active task {}",
                    context.context_id,
                    entry.get()
                )))
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(entry) => {
                entry.insert(context.task_id.clone());
                Ok(())
            }
        }
    }

    /// Applies one executor event to the stored task and returns the new state.
    pub async fn apply_event(&self, event: &AgentEvent) -> Result<Task, ServerError> {
        trace!(?event, "Applying agent event.");
        match event {
            AgentEvent::Task(task) => {
                self.task_repository.save_task(task).await?;
                Ok(task.clone())
            }
            AgentEvent::StatusUpdate(update) => {
                let mut task = self
                    .task_repository
                    .get_task(&update.task_id)
                    .await?
                    .ok_or_else(|| ServerError::TaskNotFound(update.task_id.clone()))?;
                if task.status.state.is_terminal() {
                    return Err(ServerError::TaskAlreadyTerminal(task.id));
                }
                if let Some(previous) = task.status.message.take() {
                    task.history.push(previous);
                }
                task.status = update.status.clone();
                self.task_repository.save_task(&task).await?;
                debug!(task_id = %task.id, state = %task.status.state, "Task state updated.");
                Ok(task)
            }
        }
    }

    /// Handles `message/send`: runs the executor to completion and returns
    /// the resulting task.
    #[instrument(skip(self, params))]
    pub async fn send_message(&self, params: MessageSendParams) -> Result<Task, ServerError> {
        let history_length = params.history_length();
        let RunningTask {
            context,
            mut events,
            handle,
        } = self.start_task(&params).await?;

        let mut latest = None;
        while let Some(event) = events.recv().await {
            latest = Some(self.apply_event(&event).await?);
        }

        let outcome = handle
            .await
            .map_err(|e| ServerError::Internal(format!("executor task aborted: {}", e)))?;

        let mut task = match (latest, outcome) {
            (Some(task), Ok(())) => task,
            (Some(task), Err(e)) if task.status.state.is_terminal() => {
                warn!(task_id = %task.id, error = %e, "Executor failed after publishing a terminal state.");
                task
            }
            (_, Err(e)) => return Err(e),
            (None, Ok(())) => {
                return Err(ServerError::Internal(format!(
                    "executor published no events for task {}",
                    context.task_id
                )))
            }
        };

        if let Some(length) = history_length {
            task.truncate_history(length);
        }
        Ok(task)
    }

    #[instrument(skip(self), fields(task_id = %params.id))]
    pub async fn get_task(&self, params: TaskQueryParams) -> Result<Task, ServerError> {
        let mut task = self
            .task_repository
            .get_task(&params.id)
            .await?
            .ok_or_else(|| ServerError::TaskNotFound(params.id.clone()))?;
        if let Some(length) = params.history_length {
            task.truncate_history(length);
        }
        Ok(task)
    }

    #[instrument(skip(self), fields(task_id = %params.id))]
    pub async fn cancel_task(&self, params: TaskIdParams) -> Result<Task, ServerError> {
        let task = self
            .task_repository
            .get_task(&params.id)
            .await?
            .ok_or_else(|| ServerError::TaskNotFound(params.id.clone()))?;
        let terminal_state = task.status.state.is_terminal().then_some(task.status.state);

        // Executor refusal takes precedence over the task's state.
        let context = RequestContext::for_task(task);
        let (queue, mut events) = EventQueue::new();
        let result = self.executor.cancel(&context, &queue).await;
        drop(queue);
        let canceled = result?;

        if let Some(state) = terminal_state {
            return Err(ServerError::TaskNotCancelable(format!(
                "task {} is {}",
                params.id, state
            )));
        }

        while let Some(event) = events.recv().await {
            self.apply_event(&event).await?;
        }

        match canceled {
            Some(task) => {
                self.task_repository.save_task(&task).await?;
                Ok(task)
            }
            None => {
                let task = self
                    .task_repository
                    .get_task(&params.id)
                    .await?
                    .ok_or_else(|| ServerError::TaskNotFound(params.id.clone()))?;
                if task.status.state == TaskState::Canceled {
                    Ok(task)
                } else {
                    Err(ServerError::TaskNotCancelable(params.id))
                }
            }
        }
    }
}
