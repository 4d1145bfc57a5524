//! End-to-end research workflow
//!
//! Glues the controller and the synthesizer together for callers that just
//! want "topic in, report out":
//!
//! 1. (interactive) ask clarifying questions and fold them into the topic
//! 2. run the recursive research
//! 3. (unless raw-data mode) synthesize the report
//!
//! # Usage
//!
//! ```ignore
//! use deep_research::{ResearchOptions, ResearchWorkflow};
//!
//! let workflow = ResearchWorkflow::from_model(model, search);
//! let outcome = workflow.process("total value locked in lending protocols", &ResearchOptions::default()).await;
//! println!("{}", outcome.report.unwrap().to_markdown());
//! ```

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::controller::ResearchController;
use super::report::{ResearchReport, ReportSynthesizer};
use super::state::ResearchState;
use crate::config::ResearchOptions;
use crate::llm::LanguageModel;
use crate::search::SearchProvider;

/// Result of [`ResearchWorkflow::process`].
#[derive(Debug, Clone, Serialize)]
pub struct ResearchOutcome {
    /// Topic actually researched (after clarifying questions, if any).
    pub topic: String,
    /// `None` in raw-data mode.
    pub report: Option<ResearchReport>,
    pub state: ResearchState,
}

pub struct ResearchWorkflow {
    controller: ResearchController,
    synthesizer: ReportSynthesizer,
}

impl ResearchWorkflow {
    pub fn new(controller: ResearchController, synthesizer: ReportSynthesizer) -> Self {
        Self {
            controller,
            synthesizer,
        }
    }

    /// Workflow with LLM-backed planner, extractor and synthesizer.
    pub fn from_model(model: Arc<dyn LanguageModel>, search: Arc<dyn SearchProvider>) -> Self {
        Self::new(
            ResearchController::from_model(model.clone(), search),
            ReportSynthesizer::new(model),
        )
    }

    pub fn controller(&self) -> &ResearchController {
        &self.controller
    }

    /// Research `topic` and, unless `raw_data_only`, write the report.
    ///
    /// Options are used as given; call [`ResearchOptions::clamped`] first to
    /// apply the published limits. `options.limiter` overrides the
    /// controller's limiter scope for this run.
    pub async fn process(&self, topic: &str, options: &ResearchOptions) -> ResearchOutcome {
        let original_topic = topic;
        let topic = if options.interactive {
            self.with_clarifications(topic).await
        } else {
            topic.to_string()
        };

        let state = self
            .controller
            .clone()
            .with_limiter_scope(options.limiter)
            .deep_research(&topic, options.breadth, options.depth, options.concurrency)
            .await;

        if options.raw_data_only {
            info!("Raw data mode, skipping report");
            return ResearchOutcome {
                topic,
                report: None,
                state,
            };
        }

        let report = self
            .synthesizer
            .build_report(original_topic, state.learnings(), state.visited_urls(), state.analyses())
            .await;

        ResearchOutcome {
            topic,
            report: Some(report),
            state,
        }
    }

    async fn with_clarifications(&self, topic: &str) -> String {
        match self.controller.planner().clarifying_questions(topic).await {
            Ok(questions) if !questions.is_empty() => {
                info!(count = questions.len(), "Folding clarifying questions into topic");
                format!("{}\nConsidering questions: {}", topic, questions.join(", "))
            }
            Ok(_) => topic.to_string(),
            Err(e) => {
                warn!(error = %e, "Clarifying questions failed, using topic as is");
                topic.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LlmError, ResearchError, SearchError};
    use crate::llm::{CompletionRequest, LlmResponse};
    use crate::research::extractor::{Extraction, LearningExtractor};
    use crate::research::planner::QueryPlanner;
    use crate::research::state::ResearchQuery;
    use crate::search::Document;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct ClarifyingPlanner {
        questions: Result<Vec<String>, ()>,
        topics: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QueryPlanner for ClarifyingPlanner {
        async fn generate(
            &self,
            topic: &str,
            _prior: &[String],
            _count: usize,
        ) -> Result<Vec<ResearchQuery>, ResearchError> {
            self.topics.lock().unwrap().push(topic.to_string());
            Ok(vec![ResearchQuery::new("only query", "goal")])
        }

        async fn clarifying_questions(&self, _topic: &str) -> Result<Vec<String>, ResearchError> {
            self.questions
                .clone()
                .map_err(|_| ResearchError::Planning(LlmError::Empty))
        }
    }

    struct StaticSearch;

    #[async_trait]
    impl SearchProvider for StaticSearch {
        async fn fetch(&self, _query: &str, _timeout: Duration) -> Result<Vec<Document>, SearchError> {
            Ok(vec![Document::new("https://a.example", "A", "text")])
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    struct OneLearning;

    #[async_trait]
    impl LearningExtractor for OneLearning {
        async fn extract(
            &self,
            _query: &str,
            _research_goal: &str,
            _documents: &[Document],
            _max_learnings: usize,
            _max_follow_ups: usize,
        ) -> Result<Extraction, ResearchError> {
            Ok(Extraction {
                learnings: vec!["L1".to_string()],
                ..Extraction::empty()
            })
        }
    }

    /// Records report prompts and answers with a fixed report.
    struct ReportModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for ReportModel {
        async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError> {
            self.prompts.lock().unwrap().push(request.user_prompt.clone());
            Ok(LlmResponse::from_text(r##"{"reportMarkdown": "# Report"}"##))
        }

        fn name(&self) -> &str {
            "report"
        }
    }

    fn workflow(
        questions: Result<Vec<String>, ()>,
    ) -> (ResearchWorkflow, Arc<ClarifyingPlanner>, Arc<ReportModel>) {
        let planner = Arc::new(ClarifyingPlanner {
            questions,
            topics: Mutex::new(Vec::new()),
        });
        let model = Arc::new(ReportModel {
            prompts: Mutex::new(Vec::new()),
        });
        let controller =
            ResearchController::new(planner.clone(), Arc::new(StaticSearch), Arc::new(OneLearning));
        let workflow = ResearchWorkflow::new(controller, ReportSynthesizer::new(model.clone()));
        (workflow, planner, model)
    }

    fn interactive() -> ResearchOptions {
        ResearchOptions {
            breadth: 1,
            depth: 1,
            interactive: true,
            ..ResearchOptions::default()
        }
    }

    #[tokio::test]
    async fn test_interactive_folds_questions_into_topic() {
        let questions = vec!["Which chains?".to_string(), "Which year?".to_string()];
        let (workflow, planner, model) = workflow(Ok(questions));

        let outcome = workflow.process("lending tvl", &interactive()).await;

        let expected = "lending tvl\nConsidering questions: Which chains?, Which year?";
        assert_eq!(outcome.topic, expected);
        assert_eq!(planner.topics.lock().unwrap().as_slice(), [expected.to_string()]);

        // The report is written for the topic the user asked about.
        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("<prompt>\nlending tvl\n</prompt>"));
    }

    #[tokio::test]
    async fn test_clarifying_failure_keeps_topic() {
        let (workflow, planner, _model) = workflow(Err(()));

        let outcome = workflow.process("lending tvl", &interactive()).await;

        assert_eq!(outcome.topic, "lending tvl");
        assert_eq!(planner.topics.lock().unwrap().as_slice(), ["lending tvl".to_string()]);
        assert_eq!(outcome.state.learnings(), ["L1".to_string()]);
    }

    #[tokio::test]
    async fn test_non_interactive_skips_clarifying_questions() {
        let (workflow, planner, _model) = workflow(Ok(vec!["ignored?".to_string()]));
        let options = ResearchOptions {
            interactive: false,
            ..interactive()
        };

        let outcome = workflow.process("lending tvl", &options).await;

        assert_eq!(planner.topics.lock().unwrap().as_slice(), ["lending tvl".to_string()]);
        let report = outcome.report.unwrap();
        assert_eq!(report.to_markdown(), "# Report\n\n## Sources\n\n- https://a.example");
    }
}
