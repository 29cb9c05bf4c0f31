use crate::provider::ScriptStep;
use crate::server::handlers::jsonrpc_handler;
use crate::server::tests::{scripted_executor, test_card, two_url_script};
use crate::server::{ServerState, AGENT_CARD_PATH};
use crate::types::AgentCard;
use hyper::{Body, Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;

fn state_with(script: Vec<ScriptStep>) -> Arc<ServerState> {
    Arc::new(ServerState::new(
        scripted_executor(script),
        test_card("http://localhost:8080/"),
    ))
}

fn post(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn call(state: &Arc<ServerState>, request: Value) -> Value {
    let response = jsonrpc_handler(post(request.to_string()), state.clone())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn test_agent_card_endpoint() {
    let state = state_with(vec![]);
    let request = Request::builder()
        .method(Method::GET)
        .uri(AGENT_CARD_PATH)
        .body(Body::empty())
        .unwrap();

    let response = jsonrpc_handler(request, state.clone()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");

    let card: AgentCard = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(card, state.agent_card);
    assert_eq!(card.name, "MultiURLBrowser");
    assert!(card.capabilities.streaming);
}

#[tokio::test]
async fn test_agent_card_rejects_post() {
    let state = state_with(vec![]);
    let request = Request::builder()
        .method(Method::POST)
        .uri(AGENT_CARD_PATH)
        .body(Body::empty())
        .unwrap();

    let response = jsonrpc_handler(request, state).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_get_on_rpc_endpoint_not_allowed() {
    let state = state_with(vec![]);
    let request = Request::builder()
        .method(Method::GET)
        .uri("/")
        .body(Body::empty())
        .unwrap();

    let response = jsonrpc_handler(request, state).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_parse_error() {
    let state = state_with(vec![]);
    let response = jsonrpc_handler(post("{not json"), state).await.unwrap();
    let body = body_json(response).await;

    assert_eq!(body["error"]["code"], -32700);
    assert_eq!(body["id"], Value::Null);
}

#[tokio::test]
async fn test_invalid_request_keeps_id() {
    let state = state_with(vec![]);
    let body = call(&state, json!({"jsonrpc": "2.0", "id": 3})).await;

    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(body["id"], 3);
}

#[tokio::test]
async fn test_method_not_found() {
    let state = state_with(vec![]);
    let body = call(
        &state,
        json!({"jsonrpc": "2.0", "id": "abc", "method": "tasks/resubscribe", "params": {}}),
    )
    .await;

    assert_eq!(body["error"]["code"], -32601);
    assert_eq!(body["id"], "abc");
}

#[tokio::test]
async fn test_invalid_params() {
    let state = state_with(vec![]);
    let body = call(
        &state,
        json!({"jsonrpc": "2.0", "id": 1, "method": "message/send", "params": {"text": "hi"}}),
    )
    .await;

    assert_eq!(body["error"]["code"], -32602);
}

#[tokio::test]
async fn test_message_send_returns_completed_task() {
    let state = state_with(two_url_script());
    let body = call(
        &state,
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "message/send",
            "params": {
                "message": {
                    "role": "user",
                    "parts": [{"kind": "text", "text": "Scrape https://a.test and https://b.test"}],
                    "messageId": "m-1",
                    "kind": "message"
                }
            }
        }),
    )
    .await;

    assert!(body.get("error").is_none());
    let result = &body["result"];
    assert_eq!(result["kind"], "task");
    assert_eq!(result["status"]["state"], "completed");
    assert_eq!(
        result["status"]["message"]["parts"][0]["text"],
        "a.test says hello. b.test says goodbye."
    );
    assert_eq!(result["history"][0]["messageId"], "m-1");
}

#[tokio::test]
async fn test_tasks_get_unknown() {
    let state = state_with(vec![]);
    let body = call(
        &state,
        json!({"jsonrpc": "2.0", "id": 2, "method": "tasks/get", "params": {"id": "nope"}}),
    )
    .await;

    assert_eq!(body["error"]["code"], -32001);
}

#[tokio::test]
async fn test_tasks_cancel_unsupported() {
    let state = state_with(vec![ScriptStep::reply("done")]);
    let sent = call(
        &state,
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "message/send",
            "params": {"message": {"role": "user", "parts": [{"kind": "text", "text": "go"}], "messageId": "m"}}
        }),
    )
    .await;
    let task_id = sent["result"]["id"].as_str().unwrap().to_string();

    let body = call(
        &state,
        json!({"jsonrpc": "2.0", "id": 2, "method": "tasks/cancel", "params": {"id": task_id}}),
    )
    .await;
    assert_eq!(body["error"]["code"], -32004);
}

#[tokio::test]
async fn test_message_stream_is_event_stream() {
    let state = state_with(vec![ScriptStep::reply("done")]);
    let request = json!({
        "jsonrpc": "2.0",
        "id": 9,
        "method": "message/stream",
        "params": {"message": {"role": "user", "parts": [{"kind": "text", "text": "go"}], "messageId": "m"}}
    });

    let response = jsonrpc_handler(post(request.to_string()), state).await.unwrap();
    assert_eq!(response.headers()["content-type"], "text/event-stream");

    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let frames: Vec<&str> = text.split("\n\n").filter(|f| !f.is_empty()).collect();
    assert!(frames.iter().all(|f| f.starts_with("data: ")));

    let last: Value = serde_json::from_str(&frames[frames.len() - 1]["data: ".len()..]).unwrap();
    assert_eq!(last["id"], 9);
    assert_eq!(last["result"]["final"], true);
    assert_eq!(last["result"]["status"]["state"], "completed");
}
