//! Research state
//!
//! [`ResearchState`] accumulates learnings and visited URLs across every
//! level of the recursion. Each concurrent branch owns a private state and
//! hands it back to its parent, which folds it in with [`ResearchState::merge`].
//! Nothing here is shared between tasks, so no locking is involved.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;

/// One planned sub-query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResearchQuery {
    pub query: String,
    /// Context for the extractor prompt only; never drives control flow.
    pub research_goal: String,
}

impl ResearchQuery {
    pub fn new(query: impl Into<String>, research_goal: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            research_goal: research_goal.into(),
        }
    }
}

/// Analysis text recorded for one executed query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub query: String,
    pub analysis: String,
}

/// Insertion-ordered set of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct OrderedSet {
    items: Vec<String>,
    index: HashSet<String>,
}

impl OrderedSet {
    fn insert(&mut self, value: String) -> bool {
        if self.index.contains(&value) {
            return false;
        }
        self.index.insert(value.clone());
        self.items.push(value);
        true
    }

    fn as_slice(&self) -> &[String] {
        &self.items
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

impl Serialize for OrderedSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.items)
    }
}

impl<S: Into<String>> FromIterator<S> for OrderedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = OrderedSet::default();
        for item in iter {
            set.insert(item.into());
        }
        set
    }
}

/// Accumulated research results.
///
/// `learnings` and `visited_urls` have set semantics (first occurrence wins,
/// insertion order kept). `follow_up_questions` and `analyses` are plain
/// sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResearchState {
    learnings: OrderedSet,
    visited_urls: OrderedSet,
    follow_up_questions: Vec<String>,
    analyses: Vec<QueryAnalysis>,
}

impl ResearchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a state with learnings and URLs from an earlier run.
    pub fn with_prior<L, U>(learnings: L, visited_urls: U) -> Self
    where
        L: IntoIterator,
        L::Item: Into<String>,
        U: IntoIterator,
        U::Item: Into<String>,
    {
        Self {
            learnings: learnings.into_iter().map(Into::into).collect(),
            visited_urls: visited_urls.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn learnings(&self) -> &[String] {
        self.learnings.as_slice()
    }

    pub fn visited_urls(&self) -> &[String] {
        self.visited_urls.as_slice()
    }

    pub fn follow_up_questions(&self) -> &[String] {
        &self.follow_up_questions
    }

    pub fn analyses(&self) -> &[QueryAnalysis] {
        &self.analyses
    }

    pub fn is_empty(&self) -> bool {
        self.learnings.len() == 0 && self.visited_urls.len() == 0
    }

    pub fn add_learnings<I: IntoIterator<Item = String>>(&mut self, learnings: I) {
        for learning in learnings {
            self.learnings.insert(learning);
        }
    }

    pub fn add_urls<I: IntoIterator<Item = String>>(&mut self, urls: I) {
        for url in urls {
            self.visited_urls.insert(url);
        }
    }

    pub fn add_follow_up_questions<I: IntoIterator<Item = String>>(&mut self, questions: I) {
        self.follow_up_questions.extend(questions);
    }

    pub fn add_analysis(&mut self, query: impl Into<String>, analysis: impl Into<String>) {
        self.analyses.push(QueryAnalysis {
            query: query.into(),
            analysis: analysis.into(),
        });
    }

    /// Fold a branch result into this state.
    ///
    /// Learnings and URLs are unioned; follow-ups and analyses are appended.
    pub fn merge(&mut self, other: ResearchState) {
        self.add_learnings(other.learnings.items);
        self.add_urls(other.visited_urls.items);
        self.follow_up_questions.extend(other.follow_up_questions);
        self.analyses.extend(other.analyses);
    }
}

/// Breadth for the next recursion level. Never reaches zero.
pub fn halve_breadth(breadth: usize) -> usize {
    (breadth / 2).max(1)
}
