//! Recursive deep research
//!
//! - [`planner`]: topic → search queries
//! - [`extractor`]: documents → learnings + follow-up questions
//! - [`controller`]: breadth/depth recursion with bounded concurrency
//! - [`report`]: learnings → markdown report with sources
//! - [`workflow`]: the end-to-end pipeline used by the CLI

pub mod controller;
pub mod extractor;
pub mod planner;
pub mod prompts;
pub mod report;
pub mod state;
pub mod workflow;

pub use controller::ResearchController;
pub use extractor::{Extraction, LearningExtractor, LlmLearningExtractor};
pub use planner::{LlmQueryPlanner, QueryPlanner};
pub use prompts::ResearchPrompts;
pub use report::{sources_section, ReportSynthesizer, ResearchReport, REPORT_FAILED};
pub use state::{halve_breadth, QueryAnalysis, ResearchQuery, ResearchState};
pub use workflow::{ResearchOutcome, ResearchWorkflow};
