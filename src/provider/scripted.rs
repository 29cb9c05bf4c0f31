use crate::bridge::session::SessionHandle;
use crate::provider::{Content, ProviderError, ProviderEvent, ProviderEventStream, ReasoningProvider};
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// One scripted outcome: an event, or a failure surfaced mid-stream.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Event(ProviderEvent),
    Fail(String),
}

impl ScriptStep {
    pub fn working(text: &str) -> Self {
        ScriptStep::Event(ProviderEvent::intermediate(
            "scripted",
            Some(Content::model_text(text)),
        ))
    }

    pub fn reply(text: &str) -> Self {
        ScriptStep::Event(ProviderEvent::final_response(
            "scripted",
            Some(Content::model_text(text)),
        ))
    }
}

/// Provider that replays a fixed script, for tests and offline runs.
///
/// Every turn records the session id and appends both the user message and
/// the final reply to session history.
#[derive(Debug)]
pub struct ScriptedProvider {
    script: Vec<ScriptStep>,
    start_error: Option<String>,
    step_delay: Option<Duration>,
    sessions_seen: Mutex<Vec<String>>,
    polled: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            start_error: None,
            step_delay: None,
            sessions_seen: Mutex::new(Vec::new()),
            polled: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A provider whose turns fail before producing any event.
    pub fn failing(message: &str) -> Self {
        Self {
            start_error: Some(message.to_string()),
            ..Self::new(Vec::new())
        }
    }

    /// Waits `delay` before yielding each script step.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = Some(delay);
        self
    }

    /// Session ids of every turn started so far, in order.
    pub fn sessions_seen(&self) -> Vec<String> {
        self.sessions_seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }

    /// Number of script steps pulled by consumers across all turns.
    pub fn steps_consumed(&self) -> usize {
        self.polled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run(
        &self,
        session: SessionHandle,
        message: Content,
    ) -> Result<ProviderEventStream, ProviderError> {
        if let Some(err) = &self.start_error {
            return Err(ProviderError::Failed(err.clone()));
        }

        {
            let mut session = session.lock().await;
            debug!(session_id = %session.id, "Scripted turn started.");
            if let Ok(mut seen) = self.sessions_seen.lock() {
                seen.push(session.id.clone());
            }
            session.append(message);
            for step in &self.script {
                if let ScriptStep::Event(event) = step {
                    if event.is_final {
                        if let Some(content) = &event.content {
                            session.append(content.clone());
                        }
                    }
                }
            }
        }

        let polled = self.polled.clone();
        let delay = self.step_delay;
        let steps = stream::iter(self.script.clone()).then(move |step| {
            let polled = polled.clone();
            async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                polled.fetch_add(1, Ordering::SeqCst);
                match step {
                    ScriptStep::Event(event) => Ok(event),
                    ScriptStep::Fail(message) => Err(ProviderError::Failed(message)),
                }
            }
        });
        Ok(steps.boxed())
    }
}
