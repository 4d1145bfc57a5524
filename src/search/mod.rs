//! Web search providers
//!
//! A [`SearchProvider`] turns one text query into a list of [`Document`]s.
//! Implementations throttle themselves through a [`RateLimiter`]; one
//! provider instance is meant to be shared by every research branch so it
//! becomes the single chokepoint for outbound search traffic.

mod duckduckgo;
mod firecrawl;
mod rate_limit;

pub use duckduckgo::DuckDuckGoSearch;
pub use firecrawl::FirecrawlSearch;
pub use rate_limit::RateLimiter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SearchError;

/// One search hit with its extracted page text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub title: String,
    /// Extracted text (markdown when the provider scrapes pages).
    pub content: String,
}

impl Document {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Executes a single web search.
///
/// A search is two steps: [`throttle`](Self::throttle) waits until the
/// provider admits another request, and [`fetch`](Self::fetch) sends it.
/// Only `fetch` is subject to the caller's timeout, so time spent queued
/// behind the rate limiter never counts against a query.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Suspend the caller until the next request is allowed.
    async fn throttle(&self) {}

    /// Send `query` without throttling, giving up after `timeout`.
    async fn fetch(&self, query: &str, timeout: Duration) -> Result<Vec<Document>, SearchError>;

    /// Throttle, then fetch.
    async fn search(&self, query: &str, timeout: Duration) -> Result<Vec<Document>, SearchError> {
        self.throttle().await;
        self.fetch(query, timeout).await
    }

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// URLs of the documents, skipping blanks.
pub fn document_urls(documents: &[Document]) -> Vec<String> {
    documents
        .iter()
        .filter(|d| !d.url.trim().is_empty())
        .map(|d| d.url.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_urls_skips_blank() {
        let docs = vec![
            Document::new("https://a.example", "A", "alpha"),
            Document::new("", "no url", "beta"),
            Document::new("https://b.example", "B", ""),
        ];
        assert_eq!(
            document_urls(&docs),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }
}
