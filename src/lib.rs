//! # Deep Research
//!
//! Automated multi-round web research: plan search queries for a topic, run
//! them against a web search provider, distill the results into short
//! learnings, follow up recursively, and write a cited markdown report.
//!
//! ## Architecture
//!
//! ```text
//! ResearchWorkflow
//!   ├── ResearchController ── QueryPlanner ─────┐
//!   │                      ├─ SearchProvider    ├── LanguageModel
//!   │                      └─ LearningExtractor ┘
//!   └── ReportSynthesizer ──────────────────────────── LanguageModel
//! ```
//!
//! Every collaborator sits behind a trait, so tests (and other hosts) can
//! swap in their own planner, search backend, extractor or model.

pub mod config;
pub mod error;
pub mod llm;
pub mod research;
pub mod search;
pub mod text;

pub use config::{Config, LimiterScope, ResearchLimits, ResearchOptions};
pub use error::{LlmError, ResearchError, SearchError};
pub use llm::{CompletionRequest, LanguageModel, LlmResponse, ToolSchema};
pub use research::{
    Extraction, LearningExtractor, QueryPlanner, ReportSynthesizer, ResearchController,
    ResearchOutcome, ResearchQuery, ResearchReport, ResearchState, ResearchWorkflow,
};
pub use search::{Document, SearchProvider};
