//! DuckDuckGo search provider (FREE, no API key)
//!
//! DuckDuckGo has no free web search API, so this provider scrapes the HTML
//! endpoint. Documents carry the result snippet as their content; they are
//! shorter than Firecrawl's scraped pages but need no credentials.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Document, RateLimiter, SearchProvider};
use crate::error::SearchError;

const DEFAULT_BASE_URL: &str = "https://html.duckduckgo.com";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// =============================================================================
// PROVIDER
// =============================================================================
pub struct DuckDuckGoSearch {
    base_url: String,
    client: Client,
    max_results: usize,
    limiter: RateLimiter,
}

impl DuckDuckGoSearch {
    pub fn new(max_results: usize, rate_limit: Duration) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
            max_results: max_results.max(1),
            limiter: RateLimiter::new(rate_limit),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Extract results from the DuckDuckGo HTML page.
    ///
    /// Each result anchor (`result__a`) carries a redirect link whose `uddg`
    /// parameter holds the target URL; the snippet follows in `result__snippet`.
    fn parse_html(&self, html: &str) -> Vec<Document> {
        let mut documents = Vec::new();
        let mut seen = HashSet::new();

        for block in html.split("class=\"result__a\"").skip(1) {
            if documents.len() >= self.max_results {
                break;
            }

            let Some(url) = extract_href(block).and_then(|href| resolve_result_url(&href)) else {
                continue;
            };
            if url.contains("duckduckgo.com") || !seen.insert(url.clone()) {
                continue;
            }

            let title = block
                .split_once('>')
                .and_then(|(_, rest)| rest.split_once("</a>"))
                .map(|(inner, _)| strip_tags(inner))
                .filter(|t| !t.is_empty())
                .or_else(|| extract_domain(&url))
                .unwrap_or_else(|| "Result".to_string());

            let snippet = block
                .split_once("result__snippet")
                .and_then(|(_, rest)| rest.split_once('>'))
                .and_then(|(_, rest)| rest.split_once("</"))
                .map(|(inner, _)| strip_tags(inner))
                .unwrap_or_default();

            documents.push(Document::new(url, title, snippet));
        }

        documents
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn throttle(&self) {
        self.limiter.wait().await;
    }

    async fn fetch(&self, query: &str, timeout: Duration) -> Result<Vec<Document>, SearchError> {
        let url = format!("{}/html/?q={}", self.base_url, urlencoding::encode(query));
        debug!(url = %url, "Fetching search results");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(SearchError::RateLimited);
            }
            return Err(SearchError::Http(status.as_u16(), status.to_string()));
        }

        let body = response.text().await?;
        let documents = self.parse_html(&body);

        if documents.is_empty() {
            warn!(query = %query, "No search results found");
        } else {
            info!(query = %query, count = documents.len(), "Search completed");
        }

        Ok(documents)
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

// =============================================================================
// HTML HELPERS
// =============================================================================
fn extract_href(block: &str) -> Option<String> {
    let start = block.find("href=\"")? + "href=\"".len();
    let end = block[start..].find('"')?;
    Some(block[start..start + end].replace("&amp;", "&"))
}

/// Follow DuckDuckGo's `/l/?uddg=` redirect links to the real target.
fn resolve_result_url(href: &str) -> Option<String> {
    if let Some((_, encoded)) = href.split_once("uddg=") {
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        let decoded = urlencoding::decode(encoded).ok()?.into_owned();
        return decoded.starts_with("http").then_some(decoded);
    }
    if href.starts_with("//") {
        return Some(format!("https:{}", href));
    }
    href.starts_with("http").then(|| href.to_string())
}

fn strip_tags(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&amp;", "&")
        .replace("&#x27;", "'")
        .replace("&quot;", "\"")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract the domain name from a URL.
fn extract_domain(url: &str) -> Option<String> {
    url.split("//")
        .nth(1)?
        .split('/')
        .next()
        .map(|s| s.to_string())
}
