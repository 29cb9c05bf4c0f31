//! Reasoning providers: the language model that turns a session and a user
//! message into a stream of events, calling tools along the way.

pub mod gemini;
pub mod scripted;

use crate::bridge::session::SessionHandle;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use gemini::{GeminiConfig, GeminiProvider};
pub use scripted::{ScriptStep, ScriptedProvider};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

/// One part of a turn. Exactly one field is set in practice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// A single turn of conversation as the model sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    #[serde(default)]
    pub parts: Vec<ContentPart>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![ContentPart::text(text)],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![ContentPart::text(text)],
        }
    }

    /// Text of the last part, if that part is text.
    pub fn trailing_text(&self) -> Option<&str> {
        self.parts.last().and_then(|p| p.text.as_deref())
    }

    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.parts.iter().filter_map(|p| p.function_call.as_ref())
    }
}

/// Something the provider emitted during a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEvent {
    pub author: String,
    pub content: Option<Content>,
    pub is_final: bool,
}

impl ProviderEvent {
    pub fn intermediate(author: &str, content: Option<Content>) -> Self {
        Self {
            author: author.to_string(),
            content,
            is_final: false,
        }
    }

    pub fn final_response(author: &str, content: Option<Content>) -> Self {
        Self {
            author: author.to_string(),
            content,
            is_final: true,
        }
    }

    /// Trailing text of the content, empty when absent.
    pub fn final_text(&self) -> String {
        self.content
            .as_ref()
            .and_then(Content::trailing_text)
            .unwrap_or_default()
            .to_string()
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error calling model: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    #[error("model exceeded {0} tool rounds without a final answer")]
    MaxToolRounds(usize),

    #[error("{0}")]
    Failed(String),
}

pub type ProviderEventStream = BoxStream<'static, Result<ProviderEvent, ProviderError>>;

#[async_trait]
pub trait ReasoningProvider: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Starts a turn: appends `message` to the session and streams the events
    /// the model produces until its final response.
    async fn run(
        &self,
        session: SessionHandle,
        message: Content,
    ) -> Result<ProviderEventStream, ProviderError>;
}
