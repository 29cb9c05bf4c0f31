use crate::types::{JsonRpcError, TaskState};
use std::fmt;
use thiserror::Error;

/// A JSON-RPC error object returned by a remote A2A agent.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    pub fn is_task_not_found(&self) -> bool {
        self.code == error_codes::ERROR_TASK_NOT_FOUND
    }

    pub fn is_unsupported_operation(&self) -> bool {
        self.code == error_codes::ERROR_UNSUPPORTED_OP
    }

    pub fn is_method_not_found(&self) -> bool {
        self.code == error_codes::ERROR_METHOD_NOT_FOUND
    }

    pub fn is_invalid_params(&self) -> bool {
        self.code == error_codes::ERROR_INVALID_PARAMS
    }
}

impl From<JsonRpcError> for RpcError {
    fn from(err: JsonRpcError) -> Self {
        Self {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC error: {} (code: {})", self.message, self.code)
    }
}

impl std::error::Error for RpcError {}

/// Errors raised while discovering or calling a remote agent.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The agent card could not be fetched or did not parse.
    #[error("agent discovery failed for {url}: {reason}")]
    Discovery { url: String, reason: String },

    /// Transport failure: connection refused, timeout, non-success HTTP status.
    #[error("communication error: {0}")]
    Communication(String),

    /// The remote agent answered with a JSON-RPC error object.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// The response did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The remote task ended in a terminal state other than completed.
    #[error("remote task {task_id} ended as {state}: {reason}")]
    TaskFailed {
        task_id: String,
        state: TaskState,
        reason: String,
    },
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Communication(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Protocol(err.to_string())
    }
}

pub mod error_codes {
    // JSON-RPC standard error codes
    pub const ERROR_PARSE: i64 = -32700;
    pub const ERROR_INVALID_REQUEST: i64 = -32600;
    pub const ERROR_METHOD_NOT_FOUND: i64 = -32601;
    pub const ERROR_INVALID_PARAMS: i64 = -32602;
    pub const ERROR_INTERNAL: i64 = -32603;

    // A2A-specific error codes
    pub const ERROR_TASK_NOT_FOUND: i64 = -32001;
    pub const ERROR_TASK_NOT_CANCELABLE: i64 = -32002;
    pub const ERROR_UNSUPPORTED_OP: i64 = -32004;
}
