//! Error types for the research engine.
//!
//! Every failure inside a research branch is converted into an empty
//! contribution at the branch boundary, so these types mostly travel as far
//! as a `warn!` line. They are still typed so callers of the individual
//! components (planner, extractor, providers) can match on them.

use thiserror::Error;

/// Errors raised by a [`LanguageModel`](crate::llm::LanguageModel) backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("LLM endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to decode LLM response: {0}")]
    Decode(String),

    #[error("LLM returned an empty response")]
    Empty,

    #[error("Expected a text response but the model returned tool call `{0}`")]
    UnexpectedToolCall(String),
}

/// Errors raised by a [`SearchProvider`](crate::search::SearchProvider).
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized - check the search API key")]
    Unauthorized,

    #[error("Rate limited by search provider")]
    RateLimited,

    #[error("Search provider error ({0}): {1}")]
    Http(u16, String),

    #[error("Failed to parse search response: {0}")]
    Parse(String),

    #[error("Missing configuration: {0}")]
    MissingKey(String),
}

impl SearchError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::Timeout
            | SearchError::Connection(_)
            | SearchError::Network(_)
            | SearchError::RateLimited => true,
            SearchError::Http(status, _) => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else if e.is_connect() {
            SearchError::Connection(e.to_string())
        } else if e.is_decode() {
            SearchError::Parse(e.to_string())
        } else {
            SearchError::Network(e.to_string())
        }
    }
}

/// Research pipeline error taxonomy.
///
/// None of these abort a run: the controller and the workflow degrade each of
/// them to an empty or sentinel value.
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("Query planning failed: {0}")]
    Planning(#[source] LlmError),

    #[error("Search failed for `{query}`: {source}")]
    Search {
        query: String,
        #[source]
        source: SearchError,
    },

    #[error("Learning extraction failed: {0}")]
    Extraction(#[source] LlmError),

    #[error("Report synthesis failed: {0}")]
    Synthesis(#[source] LlmError),
}
