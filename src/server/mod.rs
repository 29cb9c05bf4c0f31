pub mod event_queue;
pub mod executor;
pub mod handlers;
pub mod repositories;
pub mod services;

#[cfg(test)]
pub mod tests;

mod error;

use crate::server::executor::AgentExecutor;
use crate::server::handlers::jsonrpc_handler;
use crate::server::repositories::task_repository::{InMemoryTaskRepository, TaskRepository};
use crate::server::services::streaming_service::StreamingService;
use crate::server::services::task_service::TaskService;
use crate::types::AgentCard;
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use std::convert::Infallible;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub use error::ServerError;

pub const AGENT_CARD_PATH: &str = "/.well-known/agent.json";

/// Everything a request handler needs, shared across connections.
pub struct ServerState {
    pub task_service: Arc<TaskService>,
    pub streaming_service: Arc<StreamingService>,
    pub agent_card: AgentCard,
}

impl ServerState {
    /// Wires the services around `executor` with an in-memory task store.
    pub fn new(executor: Arc<dyn AgentExecutor>, agent_card: AgentCard) -> Self {
        Self::with_repository(Arc::new(InMemoryTaskRepository::new()), executor, agent_card)
    }

    pub fn with_repository(
        task_repository: Arc<dyn TaskRepository>,
        executor: Arc<dyn AgentExecutor>,
        agent_card: AgentCard,
    ) -> Self {
        let task_service = Arc::new(TaskService::new(task_repository, executor));
        let streaming_service = Arc::new(StreamingService::new(task_service.clone()));
        Self {
            task_service,
            streaming_service,
            agent_card,
        }
    }
}

/// A running server: where it listens and the task serving it.
pub struct ServerHandle {
    pub local_addr: SocketAddr,
    pub join_handle: JoinHandle<Result<(), hyper::Error>>,
}

/// Binds `bind_address:port` and serves until `shutdown_token` is cancelled.
///
/// Port 0 binds an ephemeral port; the actual address is in the returned handle.
pub async fn run_server(
    bind_address: &str,
    port: u16,
    state: Arc<ServerState>,
    shutdown_token: CancellationToken,
) -> Result<ServerHandle, ServerError> {
    let addr = tokio::net::lookup_host((bind_address, port))
        .await
        .map_err(|e| ServerError::Internal(format!("cannot resolve {}:{}: {}", bind_address, port, e)))?
        .next()
        .ok_or_else(|| ServerError::Internal(format!("no address for {}:{}", bind_address, port)))?;

    let listener = TcpListener::bind(addr)
        .map_err(|e| ServerError::Internal(format!("failed to bind {}: {}", addr, e)))?;
    serve_listener(listener, state, shutdown_token)
}

/// Serves on an already bound listener until `shutdown_token` is cancelled.
pub fn serve_listener(
    listener: TcpListener,
    state: Arc<ServerState>,
    shutdown_token: CancellationToken,
) -> Result<ServerHandle, ServerError> {
    let service = make_service_fn(move |_| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| jsonrpc_handler(req, state.clone())))
        }
    });

    listener
        .set_nonblocking(true)
        .map_err(|e| ServerError::Internal(format!("failed to configure listener: {}", e)))?;
    let server = Server::from_tcp(listener)
        .map_err(|e| ServerError::Internal(format!("failed to serve listener: {}", e)))?
        .serve(service);
    let local_addr = server.local_addr();
    info!(%local_addr, "A2A server listening.");

    let graceful = server.with_graceful_shutdown(async move {
        shutdown_token.cancelled().await;
        info!("Shutdown requested. Draining connections.");
    });

    let join_handle = tokio::spawn(async move {
        let result = graceful.await;
        if let Err(e) = &result {
            error!(error = %e, "Server error.");
        }
        result
    });

    Ok(ServerHandle {
        local_addr,
        join_handle,
    })
}
