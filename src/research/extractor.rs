//! Learning extraction
//!
//! Distills the documents returned for one query into a bounded list of
//! learnings and a bounded list of follow-up questions.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::prompts::ResearchPrompts;
use crate::error::ResearchError;
use crate::llm::LanguageModel;
use crate::search::Document;
use crate::text::{parse_json_reply, trim_to_chars};

/// Per-document content budget in characters
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 25_000;

/// Output of one extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub learnings: Vec<String>,
    pub follow_up_questions: Vec<String>,
    /// Short free-form analysis of the results, when the model gave one.
    pub analysis: Option<String>,
}

impl Extraction {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
pub trait LearningExtractor: Send + Sync {
    /// Extract at most `max_learnings` learnings and `max_follow_ups`
    /// follow-up questions from `documents`. `research_goal` is advisory
    /// context for what the query was meant to find out.
    ///
    /// Malformed model output yields [`Extraction::empty`]; an `Err` means
    /// the model call itself failed.
    async fn extract(
        &self,
        query: &str,
        research_goal: &str,
        documents: &[Document],
        max_learnings: usize,
        max_follow_ups: usize,
    ) -> Result<Extraction, ResearchError>;
}

/// Extractor backed by a [`LanguageModel`].
pub struct LlmLearningExtractor {
    model: Arc<dyn LanguageModel>,
    max_content_chars: usize,
    temperature: f64,
}

impl LlmLearningExtractor {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
            temperature: 0.3,
        }
    }

    /// Set the per-document character budget
    pub fn with_max_content_chars(mut self, max_chars: usize) -> Self {
        self.max_content_chars = max_chars;
        self
    }
}

#[derive(Debug, Deserialize)]
struct ExtractionReply {
    #[serde(default)]
    learnings: Vec<String>,
    #[serde(default, rename = "followUpQuestions", alias = "follow_up_questions")]
    follow_up_questions: Vec<String>,
    #[serde(default)]
    analysis: Option<String>,
}

fn parse_extraction(
    raw: &str,
    max_learnings: usize,
    max_follow_ups: usize,
) -> serde_json::Result<Extraction> {
    let reply: ExtractionReply = parse_json_reply(raw)?;
    Ok(Extraction {
        learnings: reply.learnings.into_iter().take(max_learnings).collect(),
        follow_up_questions: reply
            .follow_up_questions
            .into_iter()
            .take(max_follow_ups)
            .collect(),
        analysis: reply.analysis.filter(|a| !a.trim().is_empty()),
    })
}

#[async_trait]
impl LearningExtractor for LlmLearningExtractor {
    async fn extract(
        &self,
        query: &str,
        research_goal: &str,
        documents: &[Document],
        max_learnings: usize,
        max_follow_ups: usize,
    ) -> Result<Extraction, ResearchError> {
        let contents: Vec<&str> = documents
            .iter()
            .map(|d| trim_to_chars(&d.content, self.max_content_chars))
            .filter(|c| !c.is_empty())
            .collect();

        if contents.is_empty() {
            debug!(query = %query, "No document content to analyze");
            return Ok(Extraction::empty());
        }

        let prompt = ResearchPrompts::extract_learnings(
            query,
            research_goal,
            &contents,
            max_learnings,
            max_follow_ups,
        );
        let reply = self
            .model
            .complete_text(&ResearchPrompts::analyst(), &prompt, self.temperature)
            .await
            .map_err(ResearchError::Extraction)?;

        match parse_extraction(&reply, max_learnings, max_follow_ups) {
            Ok(extraction) => {
                info!(
                    query = %query,
                    learnings = extraction.learnings.len(),
                    follow_ups = extraction.follow_up_questions.len(),
                    "Extracted learnings"
                );
                Ok(extraction)
            }
            Err(e) => {
                error!(query = %query, error = %e, "Error parsing extraction JSON");
                debug!(raw = %reply, "Raw extraction response");
                Ok(Extraction::empty())
            }
        }
    }
}
