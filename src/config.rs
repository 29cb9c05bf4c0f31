//! Process configuration.
//!
//! Values come from an optional TOML file, then environment variables, then
//! command line flags, each layer overriding the previous one.

use crate::card::AgentCardConfig;
use crate::provider::gemini::{
    DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, DEFAULT_INSTRUCTION, DEFAULT_MAX_TOOL_ROUNDS,
};
use crate::tools::FIRECRAWL_API_BASE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REGISTRY_URL: &str = "http://localhost:10000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0} is not set. Set it in the environment, a .env file or the config file")]
    MissingSetting(&'static str),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Listener and advertised address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind. Defaults depend on whether `PORT` came from the environment.
    pub host: Option<String>,
    pub port: Option<u16>,
    /// URL advertised in the agent card.
    pub public_url: Option<String>,
    /// Set when the port was supplied through the `PORT` environment variable.
    #[serde(skip)]
    pub port_from_env: bool,
}

impl ServerConfig {
    pub fn resolved_host(&self) -> String {
        match &self.host {
            Some(host) => host.clone(),
            None if self.port_from_env => "0.0.0.0".to_string(),
            None => "localhost".to_string(),
        }
    }

    pub fn resolved_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn resolved_public_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}/", self.resolved_host(), self.resolved_port()))
    }
}

/// Reasoning provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Gemini API key. Usually supplied through `GOOGLE_API_KEY`.
    pub google_api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// System instruction given to the model.
    pub instruction: String,
    /// Upper bound on tool-call rounds within one turn.
    pub max_tool_rounds: usize,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            google_api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            instruction: DEFAULT_INSTRUCTION.to_string(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            timeout_seconds: 120,
        }
    }
}

/// Content fetch (Firecrawl) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Firecrawl API key. Usually supplied through `FIRECRAWL_API_KEY`.
    pub firecrawl_api_key: Option<String>,
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            firecrawl_api_key: None,
            base_url: FIRECRAWL_API_BASE.to_string(),
            timeout_seconds: 60,
        }
    }
}

/// Settings for calling other agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub registry_url: String,
    /// Timeout applied to every remote agent call.
    pub timeout_seconds: u64,
    /// Offer `list_agents` and `call_agent` to the reasoning provider.
    pub expose_tools: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            timeout_seconds: 300,
            expose_tools: false,
        }
    }
}

impl OrchestratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub fetch: FetchConfig,
    pub agent: AgentCardConfig,
    pub orchestrator: OrchestratorConfig,
}

impl BridgeConfig {
    /// Reads `path` if given, then applies process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!(path = %path.display(), "Loading configuration file.");
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies environment overrides, reading variables through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = lookup("GOOGLE_API_KEY") {
            self.llm.google_api_key = Some(key);
        }
        if let Some(key) = lookup("FIRECRAWL_API_KEY") {
            self.fetch.firecrawl_api_key = Some(key);
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.llm.model = model;
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = Some(host);
        }
        if let Some(port) = lookup("PORT") {
            let parsed = port.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: port.clone(),
            })?;
            self.server.port = Some(parsed);
            self.server.port_from_env = true;
        }
        if let Some(url) = lookup("PUBLIC_URL") {
            self.server.public_url = Some(url);
        }
        if let Some(url) = lookup("AGENT_REGISTRY_BASE_URL") {
            self.orchestrator.registry_url = url;
        }
        debug!(server = ?self.server, "Environment overrides applied.");
        Ok(())
    }

    /// Applies command line flags, which win over every other source except
    /// for a `PORT` set in the environment.
    pub fn apply_cli(&mut self, host: Option<String>, port: Option<u16>, public_url: Option<String>) {
        if host.is_some() {
            self.server.host = host;
        }
        if port.is_some() && !self.server.port_from_env {
            self.server.port = port;
        }
        if public_url.is_some() {
            self.server.public_url = public_url;
        }
    }

    /// Checks that the credentials needed to serve are present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.firecrawl_api_key.is_none() {
            return Err(ConfigError::MissingSetting("FIRECRAWL_API_KEY"));
        }
        if self.llm.google_api_key.is_none() {
            return Err(ConfigError::MissingSetting("GOOGLE_API_KEY"));
        }
        Ok(())
    }
}
