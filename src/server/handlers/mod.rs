use crate::server::services::streaming_service::SseStream;
use crate::server::{ServerError, ServerState, AGENT_CARD_PATH};
use crate::types::{JsonRpcRequest, JsonRpcResponse, MessageSendParams, TaskIdParams, TaskQueryParams};
use hyper::header::{self, HeaderValue};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Main handler for agent card and JSON-RPC requests
#[instrument(skip(req, state), fields(method = %req.method(), path = %req.uri().path()))]
pub async fn jsonrpc_handler(
    req: Request<Body>,
    state: Arc<ServerState>,
) -> Result<Response<Body>, Infallible> {
    if req.uri().path() == AGENT_CARD_PATH {
        if req.method() == Method::GET {
            debug!("Serving agent card.");
            return Ok(json_response(StatusCode::OK, &state.agent_card));
        }
        return Ok(empty_response(StatusCode::METHOD_NOT_ALLOWED));
    }
    if req.method() != Method::POST {
        return Ok(empty_response(StatusCode::METHOD_NOT_ALLOWED));
    }

    let body_bytes = match hyper::body::to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Failed to read request body.");
            return Ok(rpc_error(Value::Null, &ServerError::InvalidRequest(e.to_string())));
        }
    };

    let json_value = match serde_json::from_slice::<Value>(&body_bytes) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Request body is not valid JSON.");
            return Ok(rpc_error(Value::Null, &ServerError::Parse(e.to_string())));
        }
    };
    let id = json_value.get("id").cloned().unwrap_or(Value::Null);

    let request = match serde_json::from_value::<JsonRpcRequest>(json_value) {
        Ok(request) => request,
        Err(e) => return Ok(rpc_error(id, &ServerError::InvalidRequest(e.to_string()))),
    };

    info!(rpc_method = %request.method, "Dispatching JSON-RPC request.");
    match dispatch(request, &state).await {
        Ok(response) => Ok(response),
        Err(e) => {
            if matches!(e, ServerError::Internal(_) | ServerError::TaskExecutionFailed(_)) {
                error!(error = %e, "JSON-RPC request failed.");
            } else {
                debug!(error = %e, "JSON-RPC request rejected.");
            }
            Ok(rpc_error(id, &e))
        }
    }
}

async fn dispatch(request: JsonRpcRequest, state: &ServerState) -> Result<Response<Body>, ServerError> {
    let id = request.id;
    match request.method.as_str() {
        "message/send" => {
            let params: MessageSendParams = parse_params(request.params)?;
            let task = state.task_service.send_message(params).await?;
            Ok(rpc_success(id, &task))
        }
        "message/stream" => {
            let params: MessageSendParams = parse_params(request.params)?;
            let stream = state.streaming_service.stream_message(id, params).await?;
            Ok(sse_response(stream))
        }
        "tasks/get" => {
            let params: TaskQueryParams = parse_params(request.params)?;
            let task = state.task_service.get_task(params).await?;
            Ok(rpc_success(id, &task))
        }
        "tasks/cancel" => {
            let params: TaskIdParams = parse_params(request.params)?;
            let task = state.task_service.cancel_task(params).await?;
            Ok(rpc_success(id, &task))
        }
        method => Err(ServerError::MethodNotFound(method.to_string())),
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, ServerError> {
    serde_json::from_value(params).map_err(|e| ServerError::InvalidParameters(e.to_string()))
}

fn rpc_success<T: Serialize>(id: Value, result: &T) -> Response<Body> {
    json_response(StatusCode::OK, &JsonRpcResponse::success(id, result))
}

fn rpc_error(id: Value, err: &ServerError) -> Response<Body> {
    json_response(
        StatusCode::OK,
        &JsonRpcResponse::<Value>::failure(id, err.to_jsonrpc_error()),
    )
}

fn json_response<T: Serialize>(status: StatusCode, payload: &T) -> Response<Body> {
    match serde_json::to_vec(payload) {
        Ok(body) => {
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!(error = %e, "Failed to serialize response body.");
            empty_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn sse_response(stream: SseStream) -> Response<Body> {
    let mut response = Response::new(Body::wrap_stream(stream));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

fn empty_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}
