//! Bridges A2A requests to a reasoning provider.
//!
//! [`TaskBridge::invoke`] resolves the session for an A2A context, runs one
//! provider turn and translates its events into [`StatusEvent`]s: any number
//! of `Working` updates followed by exactly one `Completed`.

pub mod executor;
pub mod session;


use crate::provider::{Content, ProviderError, ProviderEvent, ProviderEventStream, ReasoningProvider};
use futures_util::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

pub use executor::BridgeExecutor;
pub use session::{Session, SessionHandle, SessionRegistry};

pub const DEFAULT_PROGRESS_TEXT: &str = "Processing the web crawling request...";

/// One step of a bridged task as seen by the executor.
///
/// [`TaskBridge`] itself never yields `Failed`; provider errors arrive as
/// `Err` items and the executor owns the translation to a failed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Working { text: String },
    Completed { text: String },
    Failed { reason: String },
}

impl StatusEvent {
    pub fn is_task_complete(&self) -> bool {
        matches!(self, StatusEvent::Completed { .. })
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StatusEvent::Working { .. })
    }

    pub fn text(&self) -> &str {
        match self {
            StatusEvent::Working { text } | StatusEvent::Completed { text } => text,
            StatusEvent::Failed { reason } => reason,
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("reasoning provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("reasoning provider finished without a final response")]
    Incomplete,
}

pub type StatusStream = BoxStream<'static, Result<StatusEvent, BridgeError>>;

enum InvokeState {
    Pending {
        provider: Arc<dyn ReasoningProvider>,
        session: SessionHandle,
        message: Content,
    },
    Streaming(ProviderEventStream),
    Finished,
}

pub struct TaskBridge {
    provider: Arc<dyn ReasoningProvider>,
    sessions: Arc<SessionRegistry>,
    progress_text: String,
}

impl TaskBridge {
    pub fn new(provider: Arc<dyn ReasoningProvider>, sessions: Arc<SessionRegistry>) -> Self {
        Self {
            provider,
            sessions,
            progress_text: DEFAULT_PROGRESS_TEXT.to_string(),
        }
    }

    pub fn with_progress_text(mut self, text: &str) -> Self {
        self.progress_text = text.to_string();
        self
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Runs `query` in the session `session_id`, creating the session on
    /// first use.
    ///
    /// The provider turn starts when the stream is first polled. The stream
    /// ends after the first `Completed` event or the first error; provider
    /// events after the final response are never pulled.
    #[instrument(skip(self, query), fields(provider = %self.provider.name()))]
    pub fn invoke(&self, query: &str, session_id: &str) -> StatusStream {
        let (session, created) = self.sessions.get_or_create(session_id);
        info!(created, "Invoking reasoning provider.");

        let progress_text = self.progress_text.clone();
        let state = InvokeState::Pending {
            provider: self.provider.clone(),
            session,
            message: Content::user_text(query),
        };

        stream::unfold(state, move |state| {
            let progress_text = progress_text.clone();
            async move {
                match state {
                    InvokeState::Pending {
                        provider,
                        session,
                        message,
                    } => match provider.run(session, message).await {
                        Ok(events) => next_status(events, &progress_text).await,
                        Err(e) => {
                            warn!(error = %e, "Provider failed to start.");
                            Some((Err(e.into()), InvokeState::Finished))
                        }
                    },
                    InvokeState::Streaming(events) => next_status(events, &progress_text).await,
                    InvokeState::Finished => None,
                }
            }
        })
        .boxed()
    }
}

async fn next_status(
    mut events: ProviderEventStream,
    progress_text: &str,
) -> Option<(Result<StatusEvent, BridgeError>, InvokeState)> {
    match events.next().await {
        Some(Ok(event)) => {
            let status = to_status(&event, progress_text);
            let next = if event.is_final {
                InvokeState::Finished
            } else {
                InvokeState::Streaming(events)
            };
            Some((Ok(status), next))
        }
        Some(Err(e)) => {
            warn!(error = %e, "Provider stream failed.");
            Some((Err(e.into()), InvokeState::Finished))
        }
        None => Some((Err(BridgeError::Incomplete), InvokeState::Finished)),
    }
}

fn to_status(event: &ProviderEvent, progress_text: &str) -> StatusEvent {
    if event.is_final {
        let text = event.final_text();
        debug!(author = %event.author, chars = text.len(), "Provider produced final response.");
        StatusEvent::Completed { text }
    } else {
        StatusEvent::Working {
            text: progress_text.to_string(),
        }
    }
}
