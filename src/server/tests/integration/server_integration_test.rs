use crate::client::{discover, send, A2aClient, ClientConfig, ClientError, StreamingResponse};
use crate::provider::ScriptStep;
use crate::server::tests::{scripted_executor, test_card, two_url_script};
use crate::server::{run_server, serve_listener, ServerHandle, ServerState};
use crate::types::{AgentCard, Message, MessageSendParams, TaskState};
use futures_util::StreamExt;
use std::error::Error;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct TestServer {
    handle: ServerHandle,
    card: AgentCard,
    shutdown: CancellationToken,
}

impl TestServer {
    fn base_url(&self) -> String {
        format!("http://{}", self.handle.local_addr)
    }
}

// Helper to start a server on a free local port
async fn start_test_server(script: Vec<ScriptStep>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let card = test_card(&format!("http://{}/", addr));
    let state = Arc::new(ServerState::new(scripted_executor(script), card.clone()));
    let shutdown = CancellationToken::new();

    let handle = serve_listener(listener, state, shutdown.clone()).unwrap();
    assert_eq!(handle.local_addr, addr);
    TestServer {
        handle,
        card,
        shutdown,
    }
}

fn config() -> ClientConfig {
    ClientConfig::with_timeout(Duration::from_secs(10))
}

#[tokio::test]
async fn test_discovered_card_matches_published_card() -> Result<(), Box<dyn Error>> {
    let server = start_test_server(two_url_script()).await;

    let card = discover(&server.base_url(), &config()).await?;
    assert_eq!(card, server.card);
    assert_eq!(card.skills[0].id, "MultiURLBrowser");
    Ok(())
}

#[tokio::test]
async fn test_two_url_scrape_end_to_end() -> Result<(), Box<dyn Error>> {
    let server = start_test_server(two_url_script()).await;

    let card = discover(&server.base_url(), &config()).await?;
    let reply = send(&card, "Scrape https://a.test and https://b.test", &config()).await?;

    assert!(!reply.is_empty());
    assert_eq!(reply, "a.test says hello. b.test says goodbye.");
    Ok(())
}

#[tokio::test]
async fn test_send_then_get_task() -> Result<(), Box<dyn Error>> {
    let server = start_test_server(vec![ScriptStep::reply("done")]).await;
    let client = A2aClient::from_card(&server.card, &config())?;

    let task = client.send_message("Scrape https://a.test").await?;
    assert_eq!(task.status.state, TaskState::Completed);

    let retrieved = client.get_task(&task.id, None).await?;
    assert_eq!(retrieved.id, task.id);
    assert_eq!(retrieved.status.state, TaskState::Completed);
    assert_eq!(retrieved.history.len(), task.history.len());

    let truncated = client.get_task(&task.id, Some(0)).await?;
    assert!(truncated.history.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_cancel_is_unsupported_over_the_wire() -> Result<(), Box<dyn Error>> {
    let server = start_test_server(vec![ScriptStep::reply("done")]).await;
    let client = A2aClient::from_card(&server.card, &config())?;
    let task = client.send_message("go").await?;

    match client.cancel_task(&task.id).await {
        Err(ClientError::Rpc(rpc)) => assert!(rpc.is_unsupported_operation()),
        other => panic!("expected unsupported operation, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_stream_message_end_to_end() -> Result<(), Box<dyn Error>> {
    let server = start_test_server(two_url_script()).await;
    let client = A2aClient::from_card(&server.card, &config())?;

    let responses: Vec<StreamingResponse> = client
        .stream_message("Scrape https://a.test and https://b.test")
        .await?
        .map(|r| r.unwrap())
        .collect()
        .await;

    assert!(matches!(responses.first(), Some(StreamingResponse::Task(_))));
    let working = responses
        .iter()
        .filter(|r| matches!(r, StreamingResponse::Status(u) if u.status.state == TaskState::Working))
        .count();
    assert!(working >= 1);

    let finals: Vec<_> = responses
        .iter()
        .filter_map(|r| match r {
            StreamingResponse::Final(update) => Some(update),
            _ => None,
        })
        .collect();
    assert_eq!(finals.len(), 1);
    assert_eq!(finals[0].status.state, TaskState::Completed);
    assert!(matches!(responses.last(), Some(StreamingResponse::Final(_))));
    Ok(())
}

#[tokio::test]
async fn test_follow_up_to_completed_task_is_rejected() -> Result<(), Box<dyn Error>> {
    let server = start_test_server(vec![ScriptStep::reply("done")]).await;
    let client = A2aClient::from_card(&server.card, &config())?;
    let task = client.send_message("first").await?;

    let mut message = Message::user_text("second");
    message.task_id = Some(task.id.clone());
    let result = client
        .send_message_with_params(MessageSendParams::new(message))
        .await;

    match result {
        Err(ClientError::Rpc(rpc)) => assert_eq!(rpc.code, -32602),
        other => panic!("expected invalid params, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_server_stops_on_shutdown() {
    let server = start_test_server(vec![]).await;
    server.shutdown.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), server.handle.join_handle)
        .await
        .expect("server should stop after shutdown");
    assert!(result.unwrap().is_ok());
}

#[tokio::test]
async fn test_run_server_binds_ephemeral_port() {
    let state = Arc::new(ServerState::new(scripted_executor(vec![]), test_card("http://localhost/")));
    let shutdown = CancellationToken::new();

    let handle = run_server("127.0.0.1", 0, state, shutdown.clone()).await.unwrap();
    assert_ne!(handle.local_addr.port(), 0);

    let card = discover(&format!("http://{}", handle.local_addr), &config()).await.unwrap();
    assert_eq!(card.name, "MultiURLBrowser");
    shutdown.cancel();
}
