//! Report synthesis
//!
//! One LLM call turns the accumulated learnings into a long-form markdown
//! report; a deterministic `## Sources` section is appended afterwards.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::prompts::ResearchPrompts;
use super::state::QueryAnalysis;
use crate::error::{LlmError, ResearchError};
use crate::llm::LanguageModel;
use crate::text::{bullet_list, bullet_list_within, parse_json_reply};

/// Returned in place of a report when the model output cannot be used.
pub const REPORT_FAILED: &str = "Error generating report: the research findings could not be synthesized.";

/// Global learnings budget of the report prompt, in characters
pub const DEFAULT_MAX_LEARNINGS_CHARS: usize = 150_000;

/// Final research artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResearchReport {
    /// Markdown body as written by the model (or the failure sentinel).
    pub body: String,
    /// Visited URLs in accumulation order.
    pub sources: Vec<String>,
}

impl ResearchReport {
    pub fn is_failed(&self) -> bool {
        self.body == REPORT_FAILED
    }

    /// Body followed by the sources section.
    pub fn to_markdown(&self) -> String {
        if self.is_failed() {
            return self.body.clone();
        }
        format!("{}{}", self.body, sources_section(&self.sources))
    }
}

/// `## Sources` section listing one `- <url>` bullet per source.
pub fn sources_section(sources: &[String]) -> String {
    format!("\n\n## Sources\n\n{}", bullet_list(sources))
}

#[derive(Debug, Deserialize)]
struct ReportReply {
    #[serde(rename = "reportMarkdown", alias = "report_markdown")]
    report_markdown: String,
}

pub struct ReportSynthesizer {
    model: Arc<dyn LanguageModel>,
    max_learnings_chars: usize,
    temperature: f64,
}

impl ReportSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            max_learnings_chars: DEFAULT_MAX_LEARNINGS_CHARS,
            temperature: 0.3,
        }
    }

    pub fn with_max_learnings_chars(mut self, max_chars: usize) -> Self {
        self.max_learnings_chars = max_chars;
        self
    }

    /// Write the report and return it as markdown with sources appended.
    ///
    /// Never fails: an unusable model reply yields [`REPORT_FAILED`].
    pub async fn synthesize(
        &self,
        topic: &str,
        learnings: &[String],
        visited_urls: &[String],
    ) -> String {
        self.build_report(topic, learnings, visited_urls, &[])
            .await
            .to_markdown()
    }

    /// Structured variant of [`synthesize`](Self::synthesize) that also feeds
    /// per-query analyses into the prompt.
    pub async fn build_report(
        &self,
        topic: &str,
        learnings: &[String],
        visited_urls: &[String],
        analyses: &[QueryAnalysis],
    ) -> ResearchReport {
        let body = match self.write_body(topic, learnings, analyses).await {
            Ok(body) => {
                info!(chars = body.len(), sources = visited_urls.len(), "Report generated");
                body
            }
            Err(e) => {
                error!(error = %e, "Report synthesis failed");
                REPORT_FAILED.to_string()
            }
        };

        ResearchReport {
            body,
            sources: visited_urls.to_vec(),
        }
    }

    async fn write_body(
        &self,
        topic: &str,
        learnings: &[String],
        analyses: &[QueryAnalysis],
    ) -> Result<String, ResearchError> {
        let learnings_block = bullet_list_within(learnings, self.max_learnings_chars);
        let analyses_block = serde_json::to_string_pretty(analyses).unwrap_or_default();
        let prompt = ResearchPrompts::write_report(topic, &learnings_block, &analyses_block);

        let reply = self
            .model
            .complete_text(&ResearchPrompts::reporter(), &prompt, self.temperature)
            .await
            .map_err(ResearchError::Synthesis)?;

        match parse_json_reply::<ReportReply>(&reply) {
            Ok(parsed) if !parsed.report_markdown.trim().is_empty() => Ok(parsed.report_markdown),
            Ok(_) => Err(ResearchError::Synthesis(LlmError::Empty)),
            Err(e) => {
                debug!(raw = %reply, "Raw report response");
                Err(ResearchError::Synthesis(LlmError::Decode(e.to_string())))
            }
        }
    }
}
