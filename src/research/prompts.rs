//! Prompt templates for the research pipeline
//!
//! - Analyst: system prompt for planning and extraction calls
//! - Reporter: system prompt for the final report
//! - User prompts for query planning, clarifying questions, learning
//!   extraction and report writing

use chrono::Utc;

use crate::text::bullet_list;

const JSON_ONLY: &str = "IMPORTANT: RETURN ONLY VALID JSON, NO OTHER TEXT OR MARKUP. \
DO NOT ADD COMMENTS (#, //, /* */) OR CODE FENCES. ALL KEYS AND BRACKETS MUST BE CLOSED.";

/// Prompt templates for the research pipeline
pub struct ResearchPrompts;

impl ResearchPrompts {
    /// Get the current date formatted for prompts
    fn current_date() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    /// System prompt for planning and extraction
    pub fn analyst() -> String {
        format!(
            r#"You are an expert research analyst that processes web search results.
For context, today's date is {date}.

Analyze the content and provide insights about:
1. Key findings and main themes
2. Source credibility and diversity
3. Information completeness and gaps
4. Emerging patterns and trends
5. Potential biases or conflicting information

Focus on concrete facts, statistics and verifiable information.
Highlight uncertainties and areas needing further research.

DON'T MAKE ANY INFORMATION UP, IT MUST COME FROM THE CONTENT PROVIDED.
FOLLOW THE REQUESTED JSON FORMAT EXACTLY."#,
            date = Self::current_date()
        )
    }

    /// System prompt for report synthesis
    pub fn reporter() -> String {
        format!(
            r#"You are an expert researcher preparing comprehensive research reports.
For context, today's date is {date}.

- You may be asked about subjects after your knowledge cutoff; assume the user is right when presented with news.
- The reader is a highly experienced analyst: be detailed, precise and correct.
- Be highly organized with clear headings and structure.
- Suggest solutions the reader may not have thought about and anticipate their needs.
- Provide detailed explanations with supporting evidence.
- Value good arguments over authorities.
- Consider new technologies and contrarian ideas, not just conventional wisdom.
- High levels of speculation or prediction are allowed, but flag them.

{json_only}"#,
            date = Self::current_date(),
            json_only = JSON_ONLY
        )
    }

    /// Query planning prompt.
    pub fn plan_queries(topic: &str, count: usize, prior_learnings: &[String]) -> String {
        let learnings = if prior_learnings.is_empty() {
            String::new()
        } else {
            format!(
                "\nPrevious learnings from research. Use them to make the new queries more specific \
                 and to avoid re-researching what is already known:\n{}\n",
                bullet_list(prior_learnings)
            )
        };

        format!(
            r#"Given the following prompt from the user, generate a list of web search queries to research the topic.
Return a JSON object with a "queries" array containing at most {count} queries (fewer if the prompt is narrow).
Each query object must have "query" and "research_goal" fields.
Make sure every query is unique and not similar to the others.

<prompt>{topic}</prompt>
{learnings}
Example response:
{{
  "queries": [
    {{"query": "QUERY 1", "research_goal": "RESEARCH GOAL 1"}},
    {{"query": "QUERY 2", "research_goal": "RESEARCH GOAL 2"}}
  ]
}}

{json_only}"#,
            count = count,
            topic = topic,
            learnings = learnings,
            json_only = JSON_ONLY
        )
    }

    /// Clarifying questions prompt (interactive mode).
    pub fn clarifying_questions(topic: &str) -> String {
        format!(
            "Given this research topic: {topic}\n\
             Generate 3-5 follow-up questions that would clarify the research needs.\n\
             Return ONLY a JSON array of strings.\n\n{json_only}",
            topic = topic,
            json_only = JSON_ONLY
        )
    }

    /// Learning extraction prompt. `contents` are already trimmed.
    pub fn extract_learnings(
        query: &str,
        research_goal: &str,
        contents: &[&str],
        max_learnings: usize,
        max_follow_ups: usize,
    ) -> String {
        let contents: String = contents
            .iter()
            .map(|c| format!("<content>\n{}\n</content>", c))
            .collect();

        let goal = if research_goal.trim().is_empty() {
            String::new()
        } else {
            format!("\nThe query was meant to answer: <goal>{}</goal>\n", research_goal.trim())
        };

        format!(
            r#"Analyze these search results for the query: <query>{query}</query>
{goal}
<contents>{contents}</contents>

Return a JSON object with:
- "analysis": a short analysis of the results (key themes, credibility, gaps)
- "learnings": at most {max_learnings} learnings
- "followUpQuestions": at most {max_follow_ups} follow-up questions that would deepen the research

The learnings must be unique, concise and information-dense: include entities, metrics, numbers and dates.
ONLY USE THE CONTENT ABOVE. DON'T MAKE ANY INFORMATION UP.

Example response:
{{
  "analysis": "Analysis of the search results",
  "learnings": ["Learning 1", "Learning 2"],
  "followUpQuestions": ["Question 1", "Question 2"]
}}

{json_only}"#,
            query = query,
            goal = goal,
            contents = contents,
            max_learnings = max_learnings,
            max_follow_ups = max_follow_ups,
            json_only = JSON_ONLY
        )
    }

    /// Final report prompt.
    pub fn write_report(topic: &str, learnings: &str, analyses: &str) -> String {
        format!(
            r#"Given the following prompt from the user, write a final report on the topic using the learnings from research.
Return a JSON object with a "reportMarkdown" field containing a detailed markdown report (aim for 3+ pages).
Include ALL the learnings from research.

<prompt>
{topic}
</prompt>

<learnings>
{learnings}
</learnings>

<analyses>
{analyses}
</analyses>

The report must include:
1. Executive Summary
2. Key Findings and Insights
3. Detailed Analysis by Theme
4. Gaps and Areas for Further Research
5. Recommendations
6. Source Analysis and Credibility Assessment

Do not add a sources section; it is appended automatically.

{json_only}"#,
            topic = topic,
            learnings = learnings,
            analyses = analyses,
            json_only = JSON_ONLY
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_queries_mentions_count_and_learnings() {
        let prompt = ResearchPrompts::plan_queries("aave", 3, &["TVL is $10B".to_string()]);
        assert!(prompt.contains("at most 3 queries"));
        assert!(prompt.contains("<prompt>aave</prompt>"));
        assert!(prompt.contains("- TVL is $10B"));
        assert!(prompt.contains("unique"));

        let prompt = ResearchPrompts::plan_queries("aave", 2, &[]);
        assert!(!prompt.contains("Previous learnings"));
    }

    #[test]
    fn test_extract_learnings_wraps_contents() {
        let prompt = ResearchPrompts::extract_learnings("q", "", &["one", "two"], 5, 2);
        assert!(prompt.contains("<content>\none\n</content><content>\ntwo\n</content>"));
        assert!(prompt.contains("followUpQuestions"));
        assert!(prompt.contains("at most 2 follow-up"));
        assert!(!prompt.contains("<goal>"));
    }

    #[test]
    fn test_extract_learnings_includes_goal() {
        let prompt =
            ResearchPrompts::extract_learnings("aave tvl", "size the largest market", &["one"], 5, 2);
        assert!(prompt.contains("<goal>size the largest market</goal>"));
    }

    #[test]
    fn test_system_prompts_carry_date() {
        let date = ResearchPrompts::current_date();
        assert!(ResearchPrompts::analyst().contains(&date));
        assert!(ResearchPrompts::reporter().contains("JSON"));
    }
}
