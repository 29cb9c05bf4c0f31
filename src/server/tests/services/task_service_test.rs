use crate::bridge::executor::COMPLETED_FALLBACK_TEXT;
use crate::provider::ScriptStep;
use crate::server::repositories::task_repository::{InMemoryTaskRepository, TaskRepository};
use crate::server::services::task_service::{RunningTask, TaskService};
use crate::server::tests::{failing_executor, scripted_executor, slow_executor, two_url_script};
use crate::server::ServerError;
use crate::types::{
    Message, MessageSendConfiguration, MessageSendParams, Role, Task, TaskIdParams, TaskQueryParams,
    TaskState, TaskStatus,
};
use std::sync::Arc;
use std::time::Duration;

fn service_with(script: Vec<ScriptStep>) -> (TaskService, Arc<InMemoryTaskRepository>) {
    let repository = Arc::new(InMemoryTaskRepository::new());
    let service = TaskService::new(repository.clone(), scripted_executor(script));
    (service, repository)
}

#[tokio::test]
async fn test_send_message_completes_task() {
    let (service, repository) = service_with(two_url_script());

    let task = service
        .send_message(MessageSendParams::new(Message::user_text(
            "Scrape https://a.test and https://b.test",
        )))
        .await
        .unwrap();

    assert_eq!(task.status.state, TaskState::Completed);
    assert_eq!(task.status_text(), Some("a.test says hello. b.test says goodbye."));

    // the user message followed by the two working messages
    assert_eq!(task.history.len(), 3);
    assert_eq!(task.history[0].role, Role::User);
    assert!(task.history[1..].iter().all(|m| m.role == Role::Agent));

    let stored = repository.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(stored, task);
}

#[tokio::test]
async fn test_send_message_uses_fallback_for_empty_reply() {
    let (service, _) = service_with(vec![ScriptStep::reply("")]);

    let task = service
        .send_message(MessageSendParams::new(Message::user_text("hi")))
        .await
        .unwrap();

    assert_eq!(task.status.state, TaskState::Completed);
    assert_eq!(task.status_text(), Some(COMPLETED_FALLBACK_TEXT));
}

#[tokio::test]
async fn test_send_message_keeps_client_context_id() {
    let (service, _) = service_with(vec![ScriptStep::reply("ok")]);
    let mut message = Message::user_text("hi");
    message.context_id = Some("ctx-42".to_string());

    let task = service.send_message(MessageSendParams::new(message)).await.unwrap();
    assert_eq!(task.context_id, "ctx-42");
}

#[tokio::test]
async fn test_provider_failure_yields_failed_task() {
    let repository = Arc::new(InMemoryTaskRepository::new());
    let service = TaskService::new(repository, failing_executor("quota exceeded"));

    let task = service
        .send_message(MessageSendParams::new(Message::user_text("hi")))
        .await
        .unwrap();

    assert_eq!(task.status.state, TaskState::Failed);
    let text = task.status_text().unwrap();
    assert!(text.starts_with("An error occurred:"));
    assert!(text.contains("quota exceeded"));
}

#[tokio::test]
async fn test_history_length_truncates_result() {
    let (service, repository) = service_with(two_url_script());
    let mut params = MessageSendParams::new(Message::user_text("Scrape https://a.test"));
    params.configuration = Some(MessageSendConfiguration {
        accepted_output_modes: vec!["text".to_string()],
        history_length: Some(1),
    });

    let task = service.send_message(params).await.unwrap();
    assert_eq!(task.history.len(), 1);

    let stored = repository.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(stored.history.len(), 3);
}

#[tokio::test]
async fn test_follow_up_to_terminal_task_is_rejected() {
    let (service, _) = service_with(vec![ScriptStep::reply("done")]);
    let task = service
        .send_message(MessageSendParams::new(Message::user_text("first")))
        .await
        .unwrap();

    let mut follow_up = Message::user_text("second");
    follow_up.task_id = Some(task.id.clone());
    let err = service
        .send_message(MessageSendParams::new(follow_up))
        .await
        .unwrap_err();

    assert!(matches!(err, ServerError::TaskAlreadyTerminal(id) if id == task.id));
}

#[tokio::test]
async fn test_follow_up_to_unknown_task_is_not_found() {
    let (service, _) = service_with(vec![ScriptStep::reply("done")]);
    let mut message = Message::user_text("hello?");
    message.task_id = Some("missing".to_string());

    let err = service.send_message(MessageSendParams::new(message)).await.unwrap_err();
    assert!(matches!(err, ServerError::TaskNotFound(_)));
}

#[tokio::test]
async fn test_get_task() {
    let (service, _) = service_with(vec![ScriptStep::reply("done")]);
    let task = service
        .send_message(MessageSendParams::new(Message::user_text("first")))
        .await
        .unwrap();

    let fetched = service
        .get_task(TaskQueryParams {
            id: task.id.clone(),
            history_length: Some(0),
            metadata: None,
        })
        .await
        .unwrap();

    assert_eq!(fetched.status.state, TaskState::Completed);
    assert!(fetched.history.is_empty());
}

#[tokio::test]
async fn test_get_unknown_task() {
    let (service, _) = service_with(vec![]);
    let err = service
        .get_task(TaskQueryParams {
            id: "nope".to_string(),
            history_length: None,
            metadata: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::TaskNotFound(_)));
    assert_eq!(err.code(), -32001);
}

#[tokio::test]
async fn test_cancel_is_unsupported() {
    let (service, repository) = service_with(vec![]);
    let mut task = Task::from_message(&Message::user_text("long job"));
    task.status = TaskStatus::new(TaskState::Working, None);
    repository.save_task(&task).await.unwrap();

    let err = service
        .cancel_task(TaskIdParams {
            id: task.id.clone(),
            metadata: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ServerError::UnsupportedOperation(_)));
    assert_eq!(err.code(), -32004);
    let stored = repository.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(stored.status.state, TaskState::Working);
}

#[tokio::test]
async fn test_cancel_completed_task_is_unsupported() {
    let (service, _) = service_with(vec![ScriptStep::reply("done")]);
    let task = service
        .send_message(MessageSendParams::new(Message::user_text("first")))
        .await
        .unwrap();

    let err = service
        .cancel_task(TaskIdParams {
            id: task.id,
            metadata: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::UnsupportedOperation(_)));
}

#[tokio::test]
async fn test_cancel_unknown_task() {
    let (service, _) = service_with(vec![]);
    let err = service
        .cancel_task(TaskIdParams {
            id: "nope".to_string(),
            metadata: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::TaskNotFound(_)));
}

fn in_context(text: &str, context_id: &str) -> MessageSendParams {
    let mut message = Message::user_text(text);
    message.context_id = Some(context_id.to_string());
    MessageSendParams::new(message)
}

#[tokio::test]
async fn test_one_active_task_per_context() {
    let service = TaskService::new(
        Arc::new(InMemoryTaskRepository::new()),
        slow_executor(two_url_script(), Duration::from_millis(50)),
    );

    let RunningTask {
        context,
        mut events,
        handle,
    } = service.start_task(&in_context("first", "ctx-shared")).await.unwrap();

    let err = service
        .start_task(&in_context("second", "ctx-shared"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ServerError::InvalidParameters(ref msg) if msg.contains(&context.task_id)));
    assert_eq!(err.code(), -32602);

    // other contexts are unaffected
    let other = service.send_message(in_context("elsewhere", "ctx-other")).await.unwrap();
    assert_eq!(other.status.state, TaskState::Completed);

    while let Some(event) = events.recv().await {
        service.apply_event(&event).await.unwrap();
    }
    handle.await.unwrap().unwrap();

    let next = service.send_message(in_context("third", "ctx-shared")).await.unwrap();
    assert_eq!(next.status.state, TaskState::Completed);
    assert_eq!(next.context_id, "ctx-shared");
    assert_ne!(next.id, context.task_id);
}
