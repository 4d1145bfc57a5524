//! Query planning
//!
//! Turns a topic (plus learnings gathered so far) into a list of search
//! queries, each paired with the goal it is meant to serve.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::prompts::ResearchPrompts;
use super::state::ResearchQuery;
use crate::error::ResearchError;
use crate::llm::LanguageModel;
use crate::text::parse_json_reply;

/// Plans the sub-queries of one research level.
#[async_trait]
pub trait QueryPlanner: Send + Sync {
    /// Plan at most `count` queries for `topic`.
    ///
    /// Malformed model output yields an empty list rather than an error; an
    /// `Err` means the model could not be reached at all.
    async fn generate(
        &self,
        topic: &str,
        prior_learnings: &[String],
        count: usize,
    ) -> Result<Vec<ResearchQuery>, ResearchError>;

    /// Clarifying questions asked before an interactive run.
    async fn clarifying_questions(&self, _topic: &str) -> Result<Vec<String>, ResearchError> {
        Ok(Vec::new())
    }
}

/// Planner backed by a [`LanguageModel`].
pub struct LlmQueryPlanner {
    model: Arc<dyn LanguageModel>,
    temperature: f64,
}

impl LlmQueryPlanner {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            temperature: 0.3,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Deserialize)]
struct QueryPlan {
    #[serde(default)]
    queries: Vec<PlannedQuery>,
}

#[derive(Debug, Deserialize)]
struct PlannedQuery {
    query: String,
    #[serde(default, alias = "researchGoal")]
    research_goal: String,
}

/// Parse the planner reply. Blank queries are dropped; uniqueness is only
/// requested in the prompt, not enforced here.
fn parse_plan(raw: &str, count: usize) -> serde_json::Result<Vec<ResearchQuery>> {
    let plan: QueryPlan = parse_json_reply(raw)?;
    Ok(plan
        .queries
        .into_iter()
        .filter(|q| !q.query.trim().is_empty())
        .map(|q| ResearchQuery::new(q.query.trim(), q.research_goal))
        .take(count)
        .collect())
}

#[async_trait]
impl QueryPlanner for LlmQueryPlanner {
    async fn generate(
        &self,
        topic: &str,
        prior_learnings: &[String],
        count: usize,
    ) -> Result<Vec<ResearchQuery>, ResearchError> {
        let prompt = ResearchPrompts::plan_queries(topic, count, prior_learnings);
        let reply = self
            .model
            .complete_text(&ResearchPrompts::analyst(), &prompt, self.temperature)
            .await
            .map_err(ResearchError::Planning)?;

        match parse_plan(&reply, count) {
            Ok(queries) => {
                info!(count = queries.len(), requested = count, "Planned research queries");
                Ok(queries)
            }
            Err(e) => {
                error!(error = %e, "Error parsing query plan JSON");
                debug!(raw = %reply, "Raw planner response");
                Ok(Vec::new())
            }
        }
    }

    async fn clarifying_questions(&self, topic: &str) -> Result<Vec<String>, ResearchError> {
        let reply = self
            .model
            .complete_text(
                &ResearchPrompts::analyst(),
                &ResearchPrompts::clarifying_questions(topic),
                0.7,
            )
            .await
            .map_err(ResearchError::Planning)?;

        match parse_json_reply::<Vec<String>>(&reply) {
            Ok(questions) => Ok(questions),
            Err(e) => {
                error!(error = %e, "Error parsing clarifying questions JSON");
                debug!(raw = %reply, "Raw clarifying questions response");
                Ok(Vec::new())
            }
        }
    }
}
