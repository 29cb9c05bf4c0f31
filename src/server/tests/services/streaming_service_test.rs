use crate::provider::ScriptStep;
use crate::server::repositories::task_repository::{InMemoryTaskRepository, TaskRepository};
use crate::server::services::streaming_service::StreamingService;
use crate::server::services::task_service::TaskService;
use crate::server::tests::{failing_executor, scripted_executor, slow_executor, two_url_script};
use crate::types::{Message, MessageSendParams, TaskState};
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

async fn collect_frames(service: &StreamingService, message: Message) -> Vec<Value> {
    let stream = service
        .stream_message(json!(7), MessageSendParams::new(message))
        .await
        .unwrap();
    stream
        .map(|frame| {
            let frame = frame.unwrap();
            let payload = frame
                .strip_prefix("data: ")
                .and_then(|rest| rest.strip_suffix("\n\n"))
                .expect("frame should be a single SSE data line");
            serde_json::from_str(payload).unwrap()
        })
        .collect()
        .await
}

#[tokio::test]
async fn test_stream_emits_task_working_and_single_final() {
    let repository = Arc::new(InMemoryTaskRepository::new());
    let task_service = Arc::new(TaskService::new(repository.clone(), scripted_executor(two_url_script())));
    let service = StreamingService::new(task_service);

    let frames = collect_frames(&service, Message::user_text("Scrape https://a.test")).await;

    assert!(frames.iter().all(|f| f["id"] == 7 && f["jsonrpc"] == "2.0"));
    assert_eq!(frames[0]["result"]["kind"], "task");
    assert_eq!(frames[0]["result"]["status"]["state"], "submitted");

    let updates: Vec<&Value> = frames[1..].iter().map(|f| &f["result"]).collect();
    assert_eq!(updates.len(), 3);
    assert!(updates[..2]
        .iter()
        .all(|u| u["status"]["state"] == "working" && u["final"] == false));
    assert_eq!(updates[2]["status"]["state"], "completed");
    assert_eq!(updates[2]["final"], true);
    assert_eq!(frames.iter().filter(|f| f["result"]["final"] == true).count(), 1);

    let task_id = frames[0]["result"]["id"].as_str().unwrap();
    let stored = repository.get_task(task_id).await.unwrap().unwrap();
    assert_eq!(stored.status.state, TaskState::Completed);
}

#[tokio::test]
async fn test_stream_failure_ends_with_failed_final() {
    let repository = Arc::new(InMemoryTaskRepository::new());
    let task_service = Arc::new(TaskService::new(repository, failing_executor("model offline")));
    let service = StreamingService::new(task_service);

    let frames = collect_frames(&service, Message::user_text("hi")).await;

    let last = &frames.last().unwrap()["result"];
    assert_eq!(last["status"]["state"], "failed");
    assert_eq!(last["final"], true);
    let text = last["status"]["message"]["parts"][0]["text"].as_str().unwrap();
    assert!(text.contains("model offline"));
}

#[tokio::test]
async fn test_stream_to_unknown_task_fails_before_streaming() {
    let task_service = Arc::new(TaskService::new(
        Arc::new(InMemoryTaskRepository::new()),
        scripted_executor(vec![ScriptStep::reply("ok")]),
    ));
    let service = StreamingService::new(task_service);
    let mut message = Message::user_text("hi");
    message.task_id = Some("missing-task".to_string());

    let result = service
        .stream_message(json!(1), MessageSendParams::new(message))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_client_disconnect_still_finishes_task() {
    let repository = Arc::new(InMemoryTaskRepository::new());
    let task_service = Arc::new(TaskService::new(
        repository.clone(),
        slow_executor(two_url_script(), Duration::from_millis(100)),
    ));
    let service = StreamingService::new(task_service);

    let mut stream = service
        .stream_message(json!(3), MessageSendParams::new(Message::user_text("Scrape https://a.test")))
        .await
        .unwrap();
    let first = stream.next().await.unwrap().unwrap();
    let first: Value = serde_json::from_str(first.strip_prefix("data: ").unwrap().trim_end()).unwrap();
    let task_id = first["result"]["id"].as_str().unwrap().to_string();
    drop(stream);

    let mut state = TaskState::Submitted;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        state = repository.get_task(&task_id).await.unwrap().unwrap().status.state;
        if state.is_terminal() {
            break;
        }
    }
    assert_eq!(state, TaskState::Completed);
}
