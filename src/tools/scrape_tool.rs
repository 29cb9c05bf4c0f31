use super::{Tool, ToolError};
use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const FIRECRAWL_API_BASE: &str = "https://api.firecrawl.dev";

const SCRAPE_TOOL_NAME: &str = "scrape_url";

/// Retrieves the readable content of one web page.
#[async_trait]
pub trait ContentFetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &str) -> Result<String, ToolError>;
}

#[derive(Debug, Deserialize)]
struct FirecrawlResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<FirecrawlData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirecrawlData {
    #[serde(default)]
    markdown: Option<String>,
}

/// Fetches pages as markdown through the Firecrawl scrape API.
#[derive(Clone)]
pub struct FirecrawlFetcher {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FirecrawlFetcher {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, ToolError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::ConfigError(SCRAPE_TOOL_NAME.to_string(), e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl std::fmt::Debug for FirecrawlFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirecrawlFetcher")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ContentFetcher for FirecrawlFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, ToolError> {
        let failed = |msg: String| ToolError::ExecutionFailed(SCRAPE_TOOL_NAME.to_string(), msg);

        let response = self
            .client
            .post(format!("{}/v1/scrape", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "url": url, "formats": ["markdown"] }))
            .send()
            .await
            .map_err(|e| failed(format!("request to scrape API failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("scrape API returned {}: {}", status, body)));
        }

        let body: FirecrawlResponse = response
            .json()
            .await
            .map_err(|e| failed(format!("malformed scrape API response: {}", e)))?;
        if !body.success {
            return Err(failed(
                body.error.unwrap_or_else(|| "scrape was not successful".to_string()),
            ));
        }

        let markdown = body.data.and_then(|d| d.markdown).unwrap_or_default();
        debug!(bytes = markdown.len(), "Fetched page content.");
        Ok(markdown)
    }
}

/// Tool that scrapes one or more URLs and returns their content.
///
/// Each URL succeeds or fails on its own; failures are reported per URL.
pub struct ScrapeTool {
    fetcher: Arc<dyn ContentFetcher>,
}

impl ScrapeTool {
    pub fn new(fetcher: Arc<dyn ContentFetcher>) -> Self {
        Self { fetcher }
    }

    fn urls(&self, params: &Value) -> Result<Vec<String>, ToolError> {
        let mut urls: Vec<String> = params
            .get("urls")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if let Some(url) = params.get("url").and_then(Value::as_str) {
            urls.push(url.to_string());
        }
        if urls.is_empty() {
            return Err(ToolError::InvalidParams(
                self.name().to_string(),
                "Missing 'url' or 'urls' parameter".to_string(),
            ));
        }
        Ok(urls)
    }
}

#[async_trait]
impl Tool for ScrapeTool {
    fn name(&self) -> &str {
        SCRAPE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Scrapes the content of one or more web pages and returns it as markdown."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "A single URL to scrape."},
                "urls": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Several URLs to scrape."
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let urls = self.urls(&params)?;
        let fetches = urls.iter().map(|url| async move {
            match self.fetcher.fetch(url).await {
                Ok(content) => json!({ "url": url, "content": content }),
                Err(e) => {
                    warn!(%url, error = %e, "Failed to scrape URL.");
                    json!({ "url": url, "error": e.to_string() })
                }
            }
        });
        let results = join_all(fetches).await;
        Ok(json!({ "results": results }))
    }
}
