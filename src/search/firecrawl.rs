//! Firecrawl search provider
//!
//! Uses Firecrawl's `/v1/search` endpoint with markdown scraping enabled, so
//! each hit arrives with the full page text rather than a snippet.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Document, RateLimiter, SearchProvider};
use crate::error::SearchError;

/// Default Firecrawl API endpoint
const DEFAULT_BASE_URL: &str = "https://api.firecrawl.dev";

/// Default number of results per query
const DEFAULT_LIMIT: u32 = 5;

pub struct FirecrawlSearch {
    api_key: String,
    base_url: String,
    client: Client,
    limit: u32,
    limiter: RateLimiter,
}

impl FirecrawlSearch {
    /// Create a provider that waits at least `rate_limit` between requests.
    pub fn new(api_key: impl Into<String>, rate_limit: Duration) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
            limit: DEFAULT_LIMIT,
            limiter: RateLimiter::new(rate_limit),
        }
    }

    /// Create from environment variable FIRECRAWL_KEY
    pub fn from_env(rate_limit: Duration) -> Result<Self, SearchError> {
        let api_key = std::env::var("FIRECRAWL_KEY").map_err(|_| {
            SearchError::MissingKey("FIRECRAWL_KEY environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key, rate_limit))
    }

    /// Point at a self-hosted instance (or a mock server in tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set results per query
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.max(1);
        self
    }

    async fn execute_request(
        &self,
        request: &FirecrawlRequest<'_>,
        timeout: Duration,
    ) -> Result<FirecrawlResponse, SearchError> {
        let url = format!("{}/v1/search", self.base_url);
        debug!(url = %url, query = %request.query, "Sending Firecrawl search");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<FirecrawlResponse>()
                .await
                .map_err(|e| SearchError::Parse(e.to_string()));
        }

        let error_text = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 | 403 => Err(SearchError::Unauthorized),
            429 => Err(SearchError::RateLimited),
            code => Err(SearchError::Http(code, error_text)),
        }
    }
}

#[derive(Debug, Serialize)]
struct FirecrawlRequest<'a> {
    query: &'a str,
    limit: u32,
    #[serde(rename = "scrapeOptions")]
    scrape_options: ScrapeOptions,
}

#[derive(Debug, Serialize)]
struct ScrapeOptions {
    formats: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct FirecrawlResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Vec<FirecrawlHit>,
}

#[derive(Debug, Deserialize)]
struct FirecrawlHit {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    metadata: Option<HitMetadata>,
}

#[derive(Debug, Deserialize)]
struct HitMetadata {
    #[serde(default)]
    title: Option<String>,
}

impl FirecrawlHit {
    /// Hits without a URL are dropped; the title falls back to metadata and
    /// the content to the description.
    fn into_document(self) -> Option<Document> {
        let url = self.url.filter(|u| !u.trim().is_empty())?;
        let title = self
            .title
            .filter(|t| !t.is_empty())
            .or_else(|| self.metadata.and_then(|m| m.title))
            .unwrap_or_default();
        let content = self
            .markdown
            .filter(|m| !m.trim().is_empty())
            .or(self.description)
            .unwrap_or_default();
        Some(Document::new(url, title, content))
    }
}

#[async_trait]
impl SearchProvider for FirecrawlSearch {
    async fn throttle(&self) {
        self.limiter.wait().await;
    }

    async fn fetch(&self, query: &str, timeout: Duration) -> Result<Vec<Document>, SearchError> {
        let request = FirecrawlRequest {
            query,
            limit: self.limit,
            scrape_options: ScrapeOptions {
                formats: vec!["markdown"],
            },
        };

        let response = self.execute_request(&request, timeout).await?;
        if response.success == Some(false) {
            let message = response.error.unwrap_or_else(|| "unknown error".to_string());
            warn!(query = %query, error = %message, "Firecrawl reported failure");
            return Err(SearchError::Http(200, message));
        }

        let documents: Vec<Document> = response
            .data
            .into_iter()
            .filter_map(FirecrawlHit::into_document)
            .collect();

        info!(query = %query, count = documents.len(), "Firecrawl search completed");
        Ok(documents)
    }

    fn name(&self) -> &str {
        "firecrawl"
    }
}
