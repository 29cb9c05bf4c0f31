use crate::client::errors::error_codes;
use crate::types::JsonRpcError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ServerError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task not cancelable: {0}")]
    TaskNotCancelable(String),

    #[error("Invalid JSON payload: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Task {0} is already in a terminal state")]
    TaskAlreadyTerminal(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("This operation is not supported: {0}")]
    UnsupportedOperation(String),

    #[error("Task execution failed: {0}")]
    TaskExecutionFailed(String),

    #[error("Event queue closed for task {0}")]
    QueueClosed(String),
}

impl ServerError {
    pub fn code(&self) -> i64 {
        match self {
            ServerError::TaskNotFound(_) => error_codes::ERROR_TASK_NOT_FOUND,
            ServerError::TaskNotCancelable(_) => error_codes::ERROR_TASK_NOT_CANCELABLE,
            ServerError::Parse(_) => error_codes::ERROR_PARSE,
            ServerError::InvalidRequest(_) => error_codes::ERROR_INVALID_REQUEST,
            ServerError::MethodNotFound(_) => error_codes::ERROR_METHOD_NOT_FOUND,
            ServerError::InvalidParameters(_) | ServerError::TaskAlreadyTerminal(_) => {
                error_codes::ERROR_INVALID_PARAMS
            }
            ServerError::UnsupportedOperation(_) => error_codes::ERROR_UNSUPPORTED_OP,
            ServerError::Internal(_)
            | ServerError::TaskExecutionFailed(_)
            | ServerError::QueueClosed(_) => error_codes::ERROR_INTERNAL,
        }
    }

    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        JsonRpcError {
            code: self.code(),
            message: self.to_string(),
            data: None,
        }
    }
}
