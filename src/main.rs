//! # Deep Research CLI
//!
//! Runs a recursive web research session on a topic and prints a markdown
//! report with its sources.
//!
//! ## Quick Start
//! ```bash
//! cargo run -- "Total value locked across Ethereum lending protocols"
//! ```

// =============================================================================
// IMPORTS
// =============================================================================
use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use deep_research::config::{Config, LimiterScope, LlmProviderKind, SearchProviderKind};
use deep_research::llm::{LanguageModel, OllamaModel, OpenAiCompatibleModel};
use deep_research::research::{ReportSynthesizer, ResearchController, ResearchWorkflow};
use deep_research::search::{DuckDuckGoSearch, FirecrawlSearch, SearchProvider};
use deep_research::ResearchOptions;

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "deep-research",
    version,
    about = "Recursive web research that plans queries, follows up, and writes a cited report",
    long_about = r#"
Deep Research - multi-round web research on any topic.

For each level it will:
  1. Ask the model for search queries about the topic
  2. Search the web and distill the results into short learnings
  3. Follow up on open questions with half the breadth, one level deeper
Finally the learnings are written up as a markdown report with sources.

EXAMPLES:
  # Default run (breadth 3, depth 2)
  deep-research "Stablecoin supply growth in 2024"

  # Wider and deeper, one branch at a time
  deep-research --breadth 5 --depth 3 --concurrency 1 "Rollup sequencer decentralization"

  # Only collect learnings and sources as JSON
  deep-research --raw "Liquid staking market share"
"#
)]
struct Args {
    /// The research topic or question to investigate
    #[arg(value_name = "TOPIC")]
    topic: String,

    /// Queries planned at the first level (1-5)
    #[arg(short = 'b', long = "breadth", default_value_t = 3)]
    breadth: usize,

    /// Recursion levels (1-3)
    #[arg(short = 'd', long = "depth", default_value_t = 2)]
    depth: usize,

    /// Branches researched at the same time (1-3)
    #[arg(short = 'c', long = "concurrency", default_value_t = 3)]
    concurrency: usize,

    /// Ask clarifying questions and fold them into the topic first
    #[arg(short = 'i', long = "interactive", default_value = "false")]
    interactive: bool,

    /// Skip the report and print the collected state as JSON
    #[arg(short = 'r', long = "raw", default_value = "false")]
    raw: bool,

    /// Model to use (overrides OLLAMA_MODEL)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// Search backend: duckduckgo or firecrawl (overrides SEARCH_PROVIDER)
    #[arg(short = 's', long = "search")]
    search: Option<String>,

    /// Give each recursion level its own concurrency bound
    #[arg(long = "per-level-limiter", conflicts_with = "shared_limiter")]
    per_level_limiter: bool,

    /// Bound concurrency across the whole run (default)
    #[arg(long = "shared-limiter")]
    shared_limiter: bool,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    verbose: bool,
}

impl Args {
    fn options(&self) -> ResearchOptions {
        let limiter = if self.per_level_limiter {
            LimiterScope::PerLevel
        } else {
            LimiterScope::Shared
        };

        ResearchOptions {
            breadth: self.breadth,
            depth: self.depth,
            concurrency: self.concurrency,
            interactive: self.interactive,
            raw_data_only: self.raw,
            limiter,
        }
        .clamped()
    }
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    let mut config = Config::from_env()?;

    if let Some(model) = &args.model {
        info!(model = %model, "Using model from command line");
        config.model = model.clone();
    }

    if let Some(search) = &args.search {
        config.search_provider = search.parse()?;
    }

    config.validate()?;

    info!(
        model = %config.model,
        llm = ?config.llm_provider,
        search = ?config.search_provider,
        "Configuration loaded"
    );

    let options = args.options();
    let workflow = build_workflow(&config);
    let outcome = workflow.process(&args.topic, &options).await;

    if options.raw_data_only {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match outcome.report {
        Some(report) if !report.is_failed() => {
            println!("\n{}", "=".repeat(60));
            println!("RESEARCH REPORT");
            println!("{}\n", "=".repeat(60));
            println!("{}", report.to_markdown());
            println!("\n{}", "=".repeat(60));
        }
        Some(report) => {
            error!(learnings = outcome.state.learnings().len(), "Report generation failed");
            eprintln!("\n{}", report.body);
            if config.llm_provider == LlmProviderKind::Ollama {
                eprintln!("\nTip: make sure Ollama is running and the model is pulled:");
                eprintln!("   ollama pull {}", config.model);
            }
            anyhow::bail!("report generation failed");
        }
        None => anyhow::bail!("no report was produced"),
    }

    info!("Research completed successfully");
    Ok(())
}

// =============================================================================
// WIRING
// =============================================================================
fn build_workflow(config: &Config) -> ResearchWorkflow {
    let model: Arc<dyn LanguageModel> = match config.llm_provider {
        LlmProviderKind::Ollama => Arc::new(OllamaModel::new(&config.ollama_host, &config.model)),
        LlmProviderKind::OpenAi => Arc::new(OpenAiCompatibleModel::new(
            &config.openai_base_url,
            config.openai_api_key.clone().unwrap_or_default(),
            &config.model,
        )),
    };

    let search: Arc<dyn SearchProvider> = match config.search_provider {
        SearchProviderKind::DuckDuckGo => Arc::new(DuckDuckGoSearch::new(
            config.max_search_results,
            config.search_rate_limit,
        )),
        SearchProviderKind::Firecrawl => Arc::new(
            FirecrawlSearch::new(
                config.firecrawl_api_key.clone().unwrap_or_default(),
                config.search_rate_limit,
            )
            .with_limit(u32::try_from(config.max_search_results).unwrap_or(u32::MAX)),
        ),
    };

    let controller = ResearchController::from_model(model.clone(), search)
        .with_limits(config.research_limits());

    ResearchWorkflow::new(controller, ReportSynthesizer::new(model))
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    // Logs go to stderr so stdout carries only the report.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["test", "What is restaking?"]);
        assert_eq!(args.topic, "What is restaking?");
        assert_eq!((args.breadth, args.depth, args.concurrency), (3, 2, 3));
        assert!(!args.raw);
        assert!(!args.interactive);
        assert_eq!(args.options().limiter, LimiterScope::Shared);
    }

    #[test]
    fn test_args_with_flags() {
        let args = Args::parse_from([
            "test",
            "--breadth", "9",
            "--depth", "0",
            "--concurrency", "2",
            "--raw",
            "--per-level-limiter",
            "--model", "qwen2.5",
            "--search", "firecrawl",
            "Test topic",
        ]);

        assert_eq!(args.topic, "Test topic");
        assert_eq!(args.model.as_deref(), Some("qwen2.5"));
        assert_eq!(args.search.as_deref(), Some("firecrawl"));

        let options = args.options();
        assert_eq!((options.breadth, options.depth, options.concurrency), (5, 1, 2));
        assert!(options.raw_data_only);
        assert_eq!(options.limiter, LimiterScope::PerLevel);
    }

    #[test]
    fn test_limiter_flags_conflict() {
        let result = Args::try_parse_from([
            "test",
            "--per-level-limiter",
            "--shared-limiter",
            "topic",
        ]);
        assert!(result.is_err());
    }
}
