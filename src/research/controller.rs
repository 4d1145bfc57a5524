//! Recursive research controller
//!
//! ```text
//!              topic, breadth, depth
//!                       │
//!                 QueryPlanner ──▶ q1 … qN (N ≤ breadth)
//!                       │
//!        ┌──────────────┼──────────────┐   at most `concurrency` at once
//!        ▼              ▼              ▼
//!    search+extract search+extract search+extract
//!        │              │              │
//!   depth > 1 and follow-ups?  ──▶ recurse(breadth/2, depth-1)
//!        │              │              │
//!        └──────────────┴──────┬───────┘
//!                              ▼
//!                     merge (set union)
//! ```
//!
//! Every branch owns its own [`ResearchState`] until the level's join point,
//! where results are folded into the parent's state. Any failure inside a
//! branch degrades that branch to an empty contribution; nothing a branch
//! does can fail the run.

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::extractor::{Extraction, LearningExtractor, LlmLearningExtractor};
use super::planner::{LlmQueryPlanner, QueryPlanner};
use super::state::{halve_breadth, ResearchQuery, ResearchState};
use crate::config::{LimiterScope, ResearchLimits};
use crate::error::{ResearchError, SearchError};
use crate::llm::LanguageModel;
use crate::search::{document_urls, Document, SearchProvider};
use crate::text::bullet_list;

/// Drives planning, search and extraction across breadth and depth.
#[derive(Clone)]
pub struct ResearchController {
    planner: Arc<dyn QueryPlanner>,
    search: Arc<dyn SearchProvider>,
    extractor: Arc<dyn LearningExtractor>,
    limits: ResearchLimits,
    scope: LimiterScope,
}

/// Concurrency bound handed down the recursion.
#[derive(Clone)]
enum Limiter {
    /// One semaphore for the whole run.
    Shared(Arc<Semaphore>),
    /// Size of the semaphore each level creates for itself.
    PerLevel(usize),
}

impl Limiter {
    /// Semaphore gating the branches of the current level.
    fn for_level(&self) -> Arc<Semaphore> {
        match self {
            Limiter::Shared(semaphore) => semaphore.clone(),
            Limiter::PerLevel(size) => Arc::new(Semaphore::new(*size)),
        }
    }

    fn holds_across_recursion(&self) -> bool {
        matches!(self, Limiter::PerLevel(_))
    }
}

/// What one branch learned before deciding whether to recurse.
struct Findings {
    urls: Vec<String>,
    extraction: Extraction,
}

impl ResearchController {
    pub fn new(
        planner: Arc<dyn QueryPlanner>,
        search: Arc<dyn SearchProvider>,
        extractor: Arc<dyn LearningExtractor>,
    ) -> Self {
        Self {
            planner,
            search,
            extractor,
            limits: ResearchLimits::default(),
            scope: LimiterScope::default(),
        }
    }

    /// Controller with the LLM-backed planner and extractor.
    pub fn from_model(model: Arc<dyn LanguageModel>, search: Arc<dyn SearchProvider>) -> Self {
        Self::new(
            Arc::new(LlmQueryPlanner::new(model.clone())),
            search,
            Arc::new(LlmLearningExtractor::new(model)),
        )
    }

    pub fn with_limits(mut self, limits: ResearchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_limiter_scope(mut self, scope: LimiterScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn limiter_scope(&self) -> LimiterScope {
        self.scope
    }

    pub fn planner(&self) -> &Arc<dyn QueryPlanner> {
        &self.planner
    }

    /// Research `topic` from scratch.
    pub async fn deep_research(
        &self,
        topic: &str,
        breadth: usize,
        depth: usize,
        concurrency: usize,
    ) -> ResearchState {
        self.run(topic, breadth, depth, concurrency, ResearchState::new())
            .await
    }

    /// Research `topic`, starting from the learnings and URLs in `prior`.
    ///
    /// Returns `prior` unchanged when `depth` is 0 or the planner yields no
    /// queries.
    pub async fn run(
        &self,
        topic: &str,
        breadth: usize,
        depth: usize,
        concurrency: usize,
        prior: ResearchState,
    ) -> ResearchState {
        let concurrency = concurrency.max(1);
        let limiter = match self.scope {
            LimiterScope::Shared => Limiter::Shared(Arc::new(Semaphore::new(concurrency))),
            LimiterScope::PerLevel => Limiter::PerLevel(concurrency),
        };

        info!(
            topic = %topic,
            breadth,
            depth,
            concurrency,
            scope = ?self.scope,
            "Starting deep research"
        );

        let state = self
            .explore(topic.to_string(), breadth.max(1), depth, limiter, prior)
            .await;

        info!(
            learnings = state.learnings().len(),
            urls = state.visited_urls().len(),
            "Deep research finished"
        );
        state
    }

    /// One recursion level. Boxed because it recurses through `branch`.
    fn explore(
        &self,
        topic: String,
        breadth: usize,
        depth: usize,
        limiter: Limiter,
        prior: ResearchState,
    ) -> BoxFuture<'_, ResearchState> {
        async move {
            if depth == 0 {
                return prior;
            }

            let queries = match self.planner.generate(&topic, prior.learnings(), breadth).await {
                Ok(queries) => queries,
                Err(e) => {
                    warn!(error = %e, depth, "Query planning failed, ending this level");
                    Vec::new()
                }
            };

            if queries.is_empty() {
                debug!(depth, "No queries planned, ending this level");
                return prior;
            }

            debug!(depth, breadth, queries = queries.len(), "Exploring research level");

            let semaphore = limiter.for_level();
            let branches = queries.into_iter().map(|query| {
                self.branch(query, breadth, depth, &limiter, semaphore.clone(), &prior)
            });
            let results = join_all(branches).await;

            let mut merged = prior;
            for result in results {
                merged.merge(result);
            }
            merged
        }
        .boxed()
    }

    /// Search, extract and possibly recurse for one planned query.
    async fn branch(
        &self,
        query: ResearchQuery,
        breadth: usize,
        depth: usize,
        limiter: &Limiter,
        semaphore: Arc<Semaphore>,
        prior: &ResearchState,
    ) -> ResearchState {
        let permit = match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!(query = %query.query, error = %e, "Concurrency limiter closed");
                return ResearchState::new();
            }
        };

        let next_breadth = halve_breadth(breadth);

        let findings = match self.investigate(&query, next_breadth).await {
            Ok(findings) => findings,
            Err(e) => {
                warn!(query = %query.query, error = %e, "Research branch failed");
                return ResearchState::new();
            }
        };

        let permit = if limiter.holds_across_recursion() {
            Some(permit)
        } else {
            drop(permit);
            None
        };

        let Findings { urls, extraction } = findings;
        let mut local = ResearchState::new();
        local.add_learnings(extraction.learnings.iter().cloned());
        local.add_urls(urls.iter().cloned());
        if let Some(analysis) = extraction.analysis {
            local.add_analysis(query.query.clone(), analysis);
        }

        if depth > 1 && !extraction.follow_up_questions.is_empty() {
            let questions = &extraction.follow_up_questions;
            let next_topic = follow_up_topic(
                &query.research_goal,
                &questions[..questions.len().min(next_breadth)],
            );

            // Copy-on-recurse: the child starts from our prior plus this branch's findings.
            let mut child_prior = ResearchState::with_prior(
                prior.learnings().iter().cloned(),
                prior.visited_urls().iter().cloned(),
            );
            child_prior.add_learnings(extraction.learnings);
            child_prior.add_urls(urls);

            debug!(query = %query.query, depth = depth - 1, breadth = next_breadth, "Recursing");
            let deeper = self
                .explore(next_topic, next_breadth, depth - 1, limiter.clone(), child_prior)
                .await;
            local.merge(deeper);
        } else {
            local.add_follow_up_questions(extraction.follow_up_questions);
        }

        drop(permit);
        local
    }

    async fn investigate(
        &self,
        query: &ResearchQuery,
        max_follow_ups: usize,
    ) -> Result<Findings, ResearchError> {
        let documents = self.search_with_retry(&query.query).await?;
        let urls = document_urls(&documents);

        let extraction = self
            .extractor
            .extract(
                &query.query,
                &query.research_goal,
                &documents,
                self.limits.max_learnings,
                max_follow_ups,
            )
            .await?;

        Ok(Findings { urls, extraction })
    }

    /// Search with a per-attempt timeout on the request itself, retrying
    /// transient failures.
    async fn search_with_retry(&self, query: &str) -> Result<Vec<Document>, ResearchError> {
        let attempts = self.limits.search_attempts.max(1);
        let timeout = self.limits.search_timeout;

        for attempt in 1..=attempts {
            // Queueing behind the provider's rate limiter is not part of the timeout.
            self.search.throttle().await;
            let outcome = match tokio::time::timeout(timeout, self.search.fetch(query, timeout)).await
            {
                Ok(result) => result,
                Err(_) => Err(SearchError::Timeout),
            };

            match outcome {
                Ok(documents) => return Ok(documents),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(query = %query, attempt, error = %e, "Search attempt failed, will retry");
                    tokio::time::sleep(self.limits.retry_delay).await;
                }
                Err(e) => {
                    return Err(ResearchError::Search {
                        query: query.to_string(),
                        source: e,
                    })
                }
            }
        }

        Err(ResearchError::Search {
            query: query.to_string(),
            source: SearchError::Timeout,
        })
    }
}

/// Topic for the next level, built from a branch's goal and follow-ups.
fn follow_up_topic(research_goal: &str, questions: &[String]) -> String {
    format!(
        "Previous research goal: {}\nFollow-up questions to explore:\n{}",
        research_goal,
        bullet_list(questions)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use crate::search::RateLimiter;

    /// Planner that returns `per_level` queries named after the call index.
    struct CountingPlanner {
        per_level: usize,
        calls: AtomicUsize,
        topics: Mutex<Vec<String>>,
    }

    impl CountingPlanner {
        fn new(per_level: usize) -> Arc<Self> {
            Arc::new(Self {
                per_level,
                calls: AtomicUsize::new(0),
                topics: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl QueryPlanner for CountingPlanner {
        async fn generate(
            &self,
            topic: &str,
            _prior: &[String],
            count: usize,
        ) -> Result<Vec<ResearchQuery>, ResearchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.topics.lock().unwrap().push(topic.to_string());
            Ok((0..self.per_level.min(count))
                .map(|i| ResearchQuery::new(format!("q{}-{}", call, i), format!("goal {}", i)))
                .collect())
        }
    }

    /// Search that tracks how many calls are in flight at once.
    struct GaugeSearch {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl GaugeSearch {
        fn new() -> Arc<Self> {
            Self::failing_first(0)
        }

        fn failing_first(n: usize) -> Arc<Self> {
            Arc::new(Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                fail_first: n,
            })
        }
    }

    #[async_trait]
    impl SearchProvider for GaugeSearch {
        async fn fetch(&self, query: &str, _timeout: Duration) -> Result<Vec<Document>, SearchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err(SearchError::Connection("reset".into()));
            }
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![Document::new(
                format!("https://example.com/{}", query),
                query,
                format!("content for {}", query),
            )])
        }

        fn name(&self) -> &str {
            "gauge"
        }
    }

    /// One learning per query and `follow_ups` follow-up questions.
    struct EchoExtractor {
        follow_ups: usize,
        budgets: Mutex<Vec<usize>>,
        goals: Mutex<Vec<String>>,
    }

    impl EchoExtractor {
        fn new(follow_ups: usize) -> Arc<Self> {
            Arc::new(Self {
                follow_ups,
                budgets: Mutex::new(Vec::new()),
                goals: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LearningExtractor for EchoExtractor {
        async fn extract(
            &self,
            query: &str,
            research_goal: &str,
            _documents: &[Document],
            _max_learnings: usize,
            max_follow_ups: usize,
        ) -> Result<Extraction, ResearchError> {
            self.budgets.lock().unwrap().push(max_follow_ups);
            self.goals.lock().unwrap().push(research_goal.to_string());
            Ok(Extraction {
                learnings: vec![format!("learning from {}", query), "shared learning".to_string()],
                follow_up_questions: (0..self.follow_ups.min(max_follow_ups))
                    .map(|i| format!("follow-up {} of {}", i, query))
                    .collect(),
                analysis: Some(format!("analysis of {}", query)),
            })
        }
    }

    fn fast_limits() -> ResearchLimits {
        ResearchLimits {
            search_timeout: Duration::from_secs(5),
            search_attempts: 3,
            retry_delay: Duration::from_millis(1),
            max_learnings: 5,
        }
    }

    #[tokio::test]
    async fn test_depth_zero_returns_prior_without_calls() {
        let planner = CountingPlanner::new(2);
        let search = GaugeSearch::new();
        let controller = ResearchController::new(planner.clone(), search.clone(), EchoExtractor::new(1));

        let prior = ResearchState::with_prior(["known"], ["https://known.example"]);
        let state = controller.run("topic", 3, 0, 2, prior.clone()).await;

        assert_eq!(state, prior);
        assert_eq!(planner.calls.load(Ordering::SeqCst), 0);
        assert_eq!(search.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_recursion_halves_breadth_and_dedups() {
        let planner = CountingPlanner::new(5);
        let search = GaugeSearch::new();
        let extractor = EchoExtractor::new(3);
        let controller = ResearchController::new(planner.clone(), search.clone(), extractor.clone())
            .with_limits(fast_limits());

        let state = controller.deep_research("topic", 4, 2, 4).await;

        // Level 1: 4 queries. Level 2: each branch recurses with breadth 2.
        assert_eq!(planner.calls.load(Ordering::SeqCst), 5);
        assert_eq!(search.calls.load(Ordering::SeqCst), 4 + 4 * 2);

        // Follow-up budget is the next level's breadth.
        let budgets = extractor.budgets.lock().unwrap().clone();
        assert_eq!(budgets.iter().filter(|b| **b == 2).count(), 4);
        assert_eq!(budgets.iter().filter(|b| **b == 1).count(), 8);

        let shared = state.learnings().iter().filter(|l| *l == "shared learning").count();
        assert_eq!(shared, 1);
        assert_eq!(state.visited_urls().len(), 12);
        assert_eq!(state.analyses().len(), 12);
    }

    #[tokio::test]
    async fn test_follow_up_topic_carries_goal_and_questions() {
        let planner = CountingPlanner::new(1);
        let controller = ResearchController::new(planner.clone(), GaugeSearch::new(), EchoExtractor::new(2))
            .with_limits(fast_limits());

        controller.deep_research("topic", 2, 2, 1).await;

        let topics = planner.topics.lock().unwrap().clone();
        assert_eq!(topics.len(), 2);
        assert_eq!(
            topics[1],
            "Previous research goal: goal 0\nFollow-up questions to explore:\n- follow-up 0 of q0-0"
        );
    }

    #[tokio::test]
    async fn test_research_goal_reaches_extractor() {
        let extractor = EchoExtractor::new(0);
        let controller = ResearchController::new(CountingPlanner::new(2), GaugeSearch::new(), extractor.clone())
            .with_limits(fast_limits());

        controller.deep_research("topic", 2, 1, 2).await;

        let mut goals = extractor.goals.lock().unwrap().clone();
        goals.sort();
        assert_eq!(goals, vec!["goal 0".to_string(), "goal 1".to_string()]);
    }

    #[tokio::test]
    async fn test_leaf_level_keeps_follow_ups() {
        let controller = ResearchController::new(CountingPlanner::new(2), GaugeSearch::new(), EchoExtractor::new(1))
            .with_limits(fast_limits());

        let state = controller.deep_research("topic", 2, 1, 2).await;
        assert_eq!(state.follow_up_questions().len(), 2);
    }

    #[tokio::test]
    async fn test_transient_search_failure_is_retried() {
        let search = GaugeSearch::failing_first(2);
        let controller = ResearchController::new(CountingPlanner::new(1), search.clone(), EchoExtractor::new(0))
            .with_limits(fast_limits());

        let state = controller.deep_research("topic", 1, 1, 1).await;
        assert_eq!(search.calls.load(Ordering::SeqCst), 3);
        assert_eq!(state.visited_urls().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_degrade_to_empty() {
        let search = GaugeSearch::failing_first(10);
        let controller = ResearchController::new(CountingPlanner::new(1), search.clone(), EchoExtractor::new(0))
            .with_limits(fast_limits());

        let state = controller.deep_research("topic", 1, 1, 1).await;
        assert_eq!(search.calls.load(Ordering::SeqCst), 3);
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_shared_limiter_bounds_in_flight_searches() {
        let search = GaugeSearch::new();
        let controller = ResearchController::new(CountingPlanner::new(3), search.clone(), EchoExtractor::new(3))
            .with_limits(fast_limits())
            .with_limiter_scope(LimiterScope::Shared);

        controller.deep_research("topic", 3, 3, 2).await;
        assert!(search.peak.load(Ordering::SeqCst) <= 2);
        assert!(search.calls.load(Ordering::SeqCst) > 3);
    }

    #[tokio::test]
    async fn test_shared_limiter_of_one_does_not_deadlock() {
        let controller = ResearchController::new(CountingPlanner::new(2), GaugeSearch::new(), EchoExtractor::new(2))
            .with_limits(fast_limits());

        let state = tokio::time::timeout(Duration::from_secs(5), controller.deep_research("topic", 2, 3, 1))
            .await
            .expect("nested levels must not wait on their parent's permit");
        assert!(!state.is_empty());
    }

    #[tokio::test]
    async fn test_per_level_limiter_completes() {
        let search = GaugeSearch::new();
        let controller = ResearchController::new(CountingPlanner::new(2), search.clone(), EchoExtractor::new(2))
            .with_limits(fast_limits())
            .with_limiter_scope(LimiterScope::PerLevel);

        let state = controller.deep_research("topic", 2, 2, 1).await;
        // breadth 2 then 1 per branch: 2 + 2 searches
        assert_eq!(search.calls.load(Ordering::SeqCst), 4);
        assert_eq!(state.visited_urls().len(), 4);
    }

    /// Search behind a real rate limiter; the request itself is instant.
    struct ThrottledSearch {
        limiter: RateLimiter,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl SearchProvider for ThrottledSearch {
        async fn throttle(&self) {
            self.limiter.wait().await;
        }

        async fn fetch(&self, query: &str, _timeout: Duration) -> Result<Vec<Document>, SearchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Document::new(format!("https://example.com/{}", query), query, "text")])
        }

        fn name(&self) -> &str {
            "throttled"
        }
    }

    /// Search that never answers for one query.
    struct HangingSearch {
        stuck_query: &'static str,
        attempts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SearchProvider for HangingSearch {
        async fn fetch(&self, query: &str, _timeout: Duration) -> Result<Vec<Document>, SearchError> {
            self.attempts.lock().unwrap().push(query.to_string());
            if query == self.stuck_query {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(vec![Document::new(format!("https://example.com/{}", query), query, "text")])
        }

        fn name(&self) -> &str {
            "hanging"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_queueing_does_not_time_out_searches() {
        let search = Arc::new(ThrottledSearch {
            limiter: RateLimiter::new(Duration::from_secs(6)),
            fetches: AtomicUsize::new(0),
        });
        let controller = ResearchController::new(CountingPlanner::new(5), search.clone(), EchoExtractor::new(5))
            .with_limiter_scope(LimiterScope::PerLevel);

        // Queued callers wait far longer than the 20 s search timeout.
        let state = controller.deep_research("topic", 5, 3, 3).await;

        // 5 queries, then 2 per branch, then 1 per branch
        assert_eq!(search.fetches.load(Ordering::SeqCst), 5 + 10 + 10);
        assert_eq!(state.visited_urls().len(), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_timeout_isolates_branch() {
        let search = Arc::new(HangingSearch {
            stuck_query: "q0-1",
            attempts: Mutex::new(Vec::new()),
        });
        let limits = ResearchLimits::default();
        let attempts = limits.search_attempts as usize;
        let controller = ResearchController::new(CountingPlanner::new(2), search.clone(), EchoExtractor::new(0))
            .with_limits(limits);

        let state = controller.deep_research("topic", 2, 1, 2).await;

        assert_eq!(state.visited_urls(), ["https://example.com/q0-0".to_string()]);
        assert!(state.learnings().contains(&"learning from q0-0".to_string()));
        assert!(!state.learnings().contains(&"learning from q0-1".to_string()));

        let stuck = search.attempts.lock().unwrap().iter().filter(|q| *q == "q0-1").count();
        assert_eq!(stuck, attempts);
    }

    #[test]
    fn test_follow_up_topic_format() {
        let topic = follow_up_topic("size the market", &["Who leads?".to_string()]);
        assert_eq!(
            topic,
            "Previous research goal: size the market\nFollow-up questions to explore:\n- Who leads?"
        );
    }
}
