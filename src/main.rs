//! pmflow - turn customer feedback into a tracked feature.
//!
//! Reads a feedback analysis, lets you pick a feature request, drafts a plan
//! with AI, and publishes the approved plan to Notion, GitHub, Slack and
//! Google Calendar.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pmflow::ai::AIManager;
use pmflow::core::{expand_path, Config};
use pmflow::feedback::{
    analyze, gather_slack_feedback, load_feedback, load_ranked, AiSentimentScorer, Feature,
    KeywordScorer, SentimentScorer,
};
use pmflow::integrations::{GitHubIssues, IssueState, ListIssuesOptions, SlackClient};
use pmflow::workflow::{render_features, preselect, Console, Pipeline, PlanGenerator, RunOptions};

/// Turn customer feedback into a tracked feature
#[derive(Parser)]
#[command(name = "pmflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Dry run mode - write local artifacts without calling any service
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the feedback-to-feature workflow (default)
    Run {
        /// Feedback analysis file
        #[arg(short, long)]
        feedback: Option<PathBuf>,

        /// Directory for the run artifacts
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Feature number to use instead of asking
        #[arg(long)]
        feature: Option<usize>,

        /// Don't confirm before publishing
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Score feedback and write a feedback analysis
    Analyze {
        /// Read feedback items from a JSON file
        #[arg(short, long, conflicts_with = "slack_channel")]
        input: Option<PathBuf>,

        /// Read feedback from a Slack channel
        #[arg(long)]
        slack_channel: Option<String>,

        /// Maximum number of Slack messages to read
        #[arg(long, default_value = "100")]
        limit: u32,

        /// Sentiment scorer
        #[arg(long, value_enum, default_value = "keyword")]
        scorer: ScorerKind,

        /// Where to write the analysis (defaults to the configured feedback file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List ranked feature requests
    Features {
        /// Feedback analysis file
        #[arg(short, long)]
        feedback: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Generate a development plan for a feature without publishing
    Plan {
        /// Feature number from `pmflow features`
        #[arg(long, default_value = "1")]
        feature: usize,

        /// Feedback analysis file
        #[arg(short, long)]
        feedback: Option<PathBuf>,
    },

    /// List, close or reopen GitHub issues
    Issue {
        #[command(subcommand)]
        operation: IssueOperation,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum IssueOperation {
    /// List open feature-request issues
    List {
        /// Only issues with this label (repeatable)
        #[arg(short, long, default_value = "feature-request")]
        label: Vec<String>,

        /// Issue state: open, closed or all
        #[arg(long, default_value = "open")]
        state: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Close an issue
    Close {
        /// Issue number
        number: u64,

        /// Comment to add first
        #[arg(short, long)]
        comment: Option<String>,
    },

    /// Reopen an issue
    Reopen {
        /// Issue number
        number: u64,

        /// Comment to add first
        #[arg(short, long)]
        comment: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScorerKind {
    /// Keyword heuristics, no network
    Keyword,
    /// Ask the configured AI provider
    Ai,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    match cli.command {
        None => cmd_run(None, None, None, false, cli.dry_run)?,
        Some(Commands::Run { feedback, output_dir, feature, yes }) => {
            cmd_run(feedback, output_dir, feature, yes, cli.dry_run)?;
        }
        Some(Commands::Analyze { input, slack_channel, limit, scorer, output }) => {
            cmd_analyze(input, slack_channel, limit, scorer, output)?;
        }
        Some(Commands::Features { feedback, format }) => {
            cmd_features(feedback, &format)?;
        }
        Some(Commands::Plan { feature, feedback }) => {
            cmd_plan(feature, feedback)?;
        }
        Some(Commands::Issue { operation }) => {
            cmd_issue(operation, cli.dry_run)?;
        }
        Some(Commands::Config { path }) => {
            cmd_config(path)?;
        }
        Some(Commands::Completions { shell }) => {
            cmd_completions(shell);
        }
    }

    Ok(())
}

fn feedback_path(config: &Config, flag: Option<PathBuf>) -> PathBuf {
    expand_path(&flag.unwrap_or_else(|| config.general.feedback_file.clone()))
}

/// Run the interactive workflow.
fn cmd_run(
    feedback: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    feature: Option<usize>,
    yes: bool,
    dry_run: bool,
) -> Result<()> {
    let config = Config::load()?;

    let mut options = RunOptions::from_config(&config);
    options.feedback_file = feedback_path(&config, feedback);
    options.output_dir = expand_path(&output_dir.unwrap_or(options.output_dir));
    options.feature = feature;
    options.auto_confirm |= yes;
    options.dry_run = dry_run;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let ai = if dry_run { AIManager::none() } else { AIManager::from_config(&config.ai).await };
        let services = config.configured_services();
        if services.is_empty() {
            println!("No services configured; only local artifacts will be written.");
        } else {
            println!("Configured services: {}", services.join(", "));
        }

        let mut pipeline = Pipeline::new(&config, &ai, Console::stdio(), options);
        let report = pipeline.run().await?;

        println!("\nRun {}: {}", report.run_id, report.status);
        for (kind, url) in report.links.iter() {
            println!("  {}: {}", kind.label(), url);
        }
        for skipped in &report.skipped {
            println!("  skipped {}", skipped);
        }
        Ok(())
    })
}

/// Score feedback from a file or a Slack channel.
fn cmd_analyze(
    input: Option<PathBuf>,
    slack_channel: Option<String>,
    limit: u32,
    scorer: ScorerKind,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = Config::load()?;
    let output = expand_path(&output.unwrap_or_else(|| config.general.feedback_file.clone()));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let items = match input {
            Some(path) => load_feedback(&expand_path(&path))?,
            None => {
                let client = SlackClient::from_config(&config.slack).ok_or_else(|| {
                    anyhow::anyhow!(
                        "No feedback source.\n\n\
                         Pass --input <file>, or set SLACK_BOT_TOKEN to read from Slack."
                    )
                })?;
                let channel = slack_channel.unwrap_or_else(|| config.slack.feedback_channel.clone());
                gather_slack_feedback(&client, &channel, limit)
                    .await
                    .with_context(|| format!("Failed to read feedback from #{}", channel))?
            }
        };

        let scorer: Box<dyn SentimentScorer> = match scorer {
            ScorerKind::Keyword => Box::new(KeywordScorer),
            ScorerKind::Ai => {
                let ai = AIManager::from_config(&config.ai).await;
                if !ai.is_available() {
                    tracing::warn!("No AI provider available, scores will come from keywords");
                }
                Box::new(AiSentimentScorer::new(ai))
            }
        };

        let analysis = analyze(items, scorer.as_ref()).await;
        analysis.write(&output)?;

        let dist = analysis.sentiment_distribution;
        println!("Analyzed {} feedback items", analysis.total_feedback);
        println!(
            "  Sentiment: {} positive, {} negative, {} neutral (overall {})",
            dist.positive, dist.negative, dist.neutral, analysis.overall_sentiment
        );
        println!("  Average polarity: {:.3}", analysis.average_sentiment_score);
        println!("  Feature requests: {}", analysis.feature_requests.len());
        println!("Wrote {}", output.display());
        Ok(())
    })
}

/// List ranked feature requests.
fn cmd_features(feedback: Option<PathBuf>, format: &str) -> Result<()> {
    let config = Config::load()?;
    let items = load_ranked(&feedback_path(&config, feedback))?;

    match format {
        "json" => {
            let features: Vec<Feature> = items.iter().map(Feature::from).collect();
            println!("{}", serde_json::to_string_pretty(&features)?);
        }
        _ => {
            if items.is_empty() {
                println!("No feature requests found.");
            } else {
                print!("{}", render_features(&items));
                println!("\nTotal: {} feature requests", items.len());
            }
        }
    }

    Ok(())
}

/// Print a generated plan for one feature.
fn cmd_plan(number: usize, feedback: Option<PathBuf>) -> Result<()> {
    let config = Config::load()?;
    let items = load_ranked(&feedback_path(&config, feedback))?;
    let feature = preselect(&items, number)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let ai = AIManager::from_config(&config.ai).await;
        let plan = PlanGenerator::new(&ai, config.ai.max_attempts).generate(&feature).await;

        println!("Plan for: {}", feature.title);
        println!("Source: {}\n", plan.source);
        print!("{}", plan.render());
        Ok(())
    })
}

/// List, close or reopen GitHub issues.
fn cmd_issue(operation: IssueOperation, dry_run: bool) -> Result<()> {
    let config = Config::load()?;
    let github = GitHubIssues::from_config(&config.github).ok_or_else(|| {
        anyhow::anyhow!(
            "GitHub Issues integration not configured.\n\n\
             To enable, set GITHUB_TOKEN with 'repo' scope,\n\
             plus GITHUB_REPO_OWNER and GITHUB_REPO_NAME."
        )
    })?;

    let (number, state, comment) = match operation {
        IssueOperation::List { label, state, json } => {
            let options = ListIssuesOptions { state, labels: label, per_page: None };
            return cmd_issue_list(&github, options, json);
        }
        IssueOperation::Close { number, comment } => (number, IssueState::Closed, comment),
        IssueOperation::Reopen { number, comment } => (number, IssueState::Open, comment),
    };

    if dry_run {
        println!("[dry-run] Would set {}#{} to {}", github.full_name(), number, state);
        return Ok(());
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let issue = github
            .set_state(number, state, comment.as_deref())
            .await
            .with_context(|| format!("Failed to update issue #{}", number))?;
        println!("#{} {} is now {}", issue.number, issue.title, issue.state);
        println!("{}", issue.html_url);
        Ok(())
    })
}

fn cmd_issue_list(github: &GitHubIssues, options: ListIssuesOptions, json: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let issues = rt
        .block_on(github.list_issues(options))
        .with_context(|| format!("Failed to list issues in {}", github.full_name()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&issues)?);
        return Ok(());
    }

    if issues.is_empty() {
        println!("No matching issues in {}", github.full_name());
        return Ok(());
    }

    for issue in &issues {
        let created = issue.created_at.as_deref().unwrap_or("-");
        println!("#{:<5} [{}] {}", issue.number, issue.state, issue.title);
        println!("       created {}  labels: {}", created, issue.label_names());
        println!("       {}", issue.html_url);
    }
    println!("\n{} issue(s)", issues.len());
    Ok(())
}

/// Show configuration.
fn cmd_config(show_path: bool) -> Result<()> {
    if show_path {
        match Config::locate() {
            Some(path) => println!("{}", path.display()),
            None => {
                if let Some(dir) = Config::config_dir() {
                    println!("{}", dir.join("config.toml").display());
                }
            }
        }
        return Ok(());
    }

    let config = Config::load()?;
    println!("{}", config.to_toml()?);

    let services = config.configured_services();
    if services.is_empty() {
        println!("# No services configured");
    } else {
        println!("# Configured services: {}", services.join(", "));
    }

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "pmflow", &mut io::stdout());
}
