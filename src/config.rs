//! # Configuration Module
//!
//! Loads the runtime [`Config`] from environment variables (and `.env`), and
//! defines the knobs of a single research run:
//! - [`ResearchOptions`]: breadth / depth / concurrency and run modes
//! - [`ResearchLimits`]: controller tunables (timeouts, retries, budgets)
//! - [`LimiterScope`]: how the concurrency bound applies across levels

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// PROVIDER SELECTION
// =============================================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    /// Local model via Ollama
    #[default]
    Ollama,
    /// Any OpenAI-compatible chat completions endpoint
    OpenAi,
}

impl FromStr for LlmProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" | "openai-compatible" => Ok(Self::OpenAi),
            other => anyhow::bail!("Unknown LLM provider `{}` (expected ollama or openai)", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    /// Key-less HTML search
    #[default]
    DuckDuckGo,
    /// Firecrawl search with page scraping (needs FIRECRAWL_KEY)
    Firecrawl,
}

impl FromStr for SearchProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "duckduckgo" | "ddg" => Ok(Self::DuckDuckGo),
            "firecrawl" => Ok(Self::Firecrawl),
            other => anyhow::bail!(
                "Unknown search provider `{}` (expected duckduckgo or firecrawl)",
                other
            ),
        }
    }
}

// =============================================================================
// RUNTIME CONFIGURATION
// =============================================================================
/// Process-wide configuration: which backends to use and how to reach them.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_provider: LlmProviderKind,

    /// Model name (Ollama tag or OpenAI-compatible model id)
    pub model: String,

    /// Ollama server URL
    pub ollama_host: String,

    pub openai_base_url: String,
    pub openai_api_key: Option<String>,

    pub search_provider: SearchProviderKind,
    pub firecrawl_api_key: Option<String>,

    /// Minimum delay between two requests to the search provider
    pub search_rate_limit: Duration,

    /// Per-attempt timeout of one search call
    pub search_timeout: Duration,

    /// Results requested per search query
    pub max_search_results: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_provider: LlmProviderKind::Ollama,
            model: "llama3.2".to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_api_key: None,
            search_provider: SearchProviderKind::DuckDuckGo,
            firecrawl_api_key: None,
            search_rate_limit: Duration::from_secs(6),
            search_timeout: Duration::from_secs(20),
            max_search_results: 5,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file is loaded first if present. Unset variables keep their
    /// defaults; malformed numbers are reported with the variable name.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = Config::default();

        if let Ok(val) = env::var("LLM_PROVIDER") {
            config.llm_provider = val.parse()?;
        }

        if let Ok(val) = env::var("OLLAMA_MODEL") {
            config.model = val;
        }

        if let Ok(val) = env::var("OLLAMA_API_BASE_URL") {
            config.ollama_host = val;
        }

        if let Ok(val) = env::var("OPENAI_BASE_URL") {
            config.openai_base_url = val;
        }

        config.openai_api_key = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());

        if let Ok(val) = env::var("SEARCH_PROVIDER") {
            config.search_provider = val.parse()?;
        }

        config.firecrawl_api_key = env::var("FIRECRAWL_KEY").ok().filter(|k| !k.is_empty());

        if let Ok(val) = env::var("SEARCH_RATE_LIMIT_SECS") {
            let secs: f64 = val
                .parse()
                .context("SEARCH_RATE_LIMIT_SECS must be a number of seconds (e.g., 6)")?;
            config.search_rate_limit = Duration::try_from_secs_f64(secs)
                .context("SEARCH_RATE_LIMIT_SECS must be a non-negative number")?;
        }

        if let Ok(val) = env::var("SEARCH_TIMEOUT_SECS") {
            config.search_timeout = Duration::from_secs(
                val.parse()
                    .context("SEARCH_TIMEOUT_SECS must be a positive integer")?,
            );
        }

        if let Ok(val) = env::var("MAX_SEARCH_RESULTS") {
            config.max_search_results = val
                .parse()
                .context("MAX_SEARCH_RESULTS must be a valid positive integer")?;
        }

        Ok(config)
    }

    /// Validate the configuration before any backend is built.
    pub fn validate(&self) -> Result<()> {
        if self.model.is_empty() {
            anyhow::bail!("OLLAMA_MODEL cannot be empty");
        }

        if self.max_search_results == 0 {
            anyhow::bail!("MAX_SEARCH_RESULTS must be at least 1");
        }

        if self.search_timeout.is_zero() {
            anyhow::bail!("SEARCH_TIMEOUT_SECS must be at least 1");
        }

        if self.search_provider == SearchProviderKind::Firecrawl && self.firecrawl_api_key.is_none()
        {
            anyhow::bail!("FIRECRAWL_KEY is required when SEARCH_PROVIDER=firecrawl");
        }

        if self.llm_provider == LlmProviderKind::OpenAi && self.openai_api_key.is_none() {
            anyhow::bail!("OPENAI_API_KEY is required when LLM_PROVIDER=openai");
        }

        Ok(())
    }

    /// Controller limits derived from this configuration.
    pub fn research_limits(&self) -> ResearchLimits {
        ResearchLimits {
            search_timeout: self.search_timeout,
            ..ResearchLimits::default()
        }
    }
}

// =============================================================================
// RESEARCH RUN SETTINGS
// =============================================================================
/// How the `concurrency` bound applies across recursion levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimiterScope {
    /// One semaphore for the whole run. A permit covers a branch's search and
    /// extraction only and is released before the branch recurses, so total
    /// in-flight external calls never exceed `concurrency`.
    #[default]
    Shared,
    /// A fresh semaphore per recursion level, with the permit held for the
    /// whole branch including its recursion. In-flight searches can grow to
    /// roughly `concurrency^depth`; keep `concurrency` small when `depth > 1`.
    PerLevel,
}

/// Controller tunables that are not part of a research request.
#[derive(Debug, Clone)]
pub struct ResearchLimits {
    /// Timeout applied to each search attempt
    pub search_timeout: Duration,
    /// Total attempts for a retryable search failure
    pub search_attempts: u32,
    /// Pause between search attempts
    pub retry_delay: Duration,
    /// Learnings kept per query
    pub max_learnings: usize,
}

impl Default for ResearchLimits {
    fn default() -> Self {
        Self {
            search_timeout: Duration::from_secs(20),
            search_attempts: 3,
            retry_delay: Duration::from_secs(2),
            max_learnings: 5,
        }
    }
}

/// Parameters of one research request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchOptions {
    /// Parallel sub-queries at the first level
    pub breadth: usize,
    /// Recursion levels
    pub depth: usize,
    /// Simultaneous branches
    pub concurrency: usize,
    /// Ask clarifying questions and fold them into the topic first
    pub interactive: bool,
    /// Skip the report and return only the accumulated state
    pub raw_data_only: bool,
    pub limiter: LimiterScope,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self {
            breadth: 3,
            depth: 2,
            concurrency: 3,
            interactive: false,
            raw_data_only: false,
            limiter: LimiterScope::Shared,
        }
    }
}

impl ResearchOptions {
    pub const MAX_DEPTH: usize = 3;
    pub const MAX_BREADTH: usize = 5;
    pub const MAX_CONCURRENCY: usize = 3;

    /// Bound the request to depth 1..=3, breadth 1..=5, concurrency 1..=3.
    pub fn clamped(mut self) -> Self {
        self.depth = self.depth.clamp(1, Self::MAX_DEPTH);
        self.breadth = self.breadth.clamp(1, Self::MAX_BREADTH);
        self.concurrency = self.concurrency.clamp(1, Self::MAX_CONCURRENCY);
        self
    }
}
