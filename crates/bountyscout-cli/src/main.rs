use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bountyscout_api::GitHubClient;
use bountyscout_core::providers::GitHubIssueSource;
use bountyscout_core::{
    Config, LanguageCache, RankingConfig, RankingEngine, RefreshOptions, RefreshOrchestrator,
};
use bountyscout_store::{IssueStatusKind, Setting, StatusFilter, Store};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bountyscout")]
#[command(version, about = "Find workable bounty issues on GitHub", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Fetch, score, and store bounty issues once
    Refresh {
        /// Emit the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Refresh on a fixed interval until interrupted
    Watch {
        /// Seconds between refreshes
        #[arg(long, default_value_t = 900)]
        interval: u64,
    },
    /// Search stored issues (free text plus repo:owner/name filters)
    Search {
        /// Search query; empty lists everything
        #[arg(default_value = "")]
        query: String,

        /// Only issues with this status (interested, in_progress, no_status)
        #[arg(long)]
        status: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 20)]
        per_page: u32,
    },
    /// Store summary: issue count, freshness, status tallies
    Status,
    /// Set or clear your status on an issue
    Mark {
        /// GitHub issue id
        github_id: u64,

        /// interested, in_progress, unwanted, or clear
        status: String,
    },
    /// Inspect and change stored settings
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(clap::Subcommand)]
enum SettingsCommand {
    /// Show the active search query
    GetQuery,
    /// Change the search query used by refresh
    SetQuery { query: String },
    /// Hide a repository from search results
    HideRepo { name: String },
    /// Show a previously hidden repository again
    ShowRepo { name: String },
    /// List known repositories and their visibility
    ListRepos,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - helps when things go sideways
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bountyscout=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;
    let store = Arc::new(
        Store::open(config.store_path()?).context("opening issue store")?,
    );

    match cli.command {
        Commands::Refresh { json } => {
            let orchestrator = build_orchestrator(&config, store);
            let report = orchestrator.refresh().await;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Watch { interval } => {
            let orchestrator = build_orchestrator(&config, store);
            tracing::info!(interval_secs = interval, "Watching for bounty issues");

            loop {
                let report = orchestrator.refresh().await;
                print_report(&report);
                tokio::time::sleep(Duration::from_secs(interval)).await;
            }
        }
        Commands::Search {
            query,
            status,
            page,
            per_page,
        } => {
            let status = status.as_deref().map(parse_status_filter).transpose()?;
            let results = store.search_issues(&query, page, per_page, status)?;

            let total_pages = results
                .total_count
                .div_ceil(u64::from(results.per_page.max(1)))
                .max(1);
            println!(
                "{} issues (page {} of {})",
                results.total_count, results.page, total_pages
            );
            for issue in &results.issues {
                let value = if issue.bounty_value > 0 {
                    format!(" ${}", issue.bounty_value)
                } else {
                    String::new()
                };
                println!(
                    "  [{:>3}]{} {} #{} - {}",
                    issue.score, value, issue.repository, issue.number, issue.title
                );
                println!("        {}", issue.html_url);
            }
        }
        Commands::Status => {
            let count = store.issue_count()?;
            let fetched = store.last_fetched_at()?;
            let counts = store.status_counts()?;

            println!("Stored issues:  {}", count);
            println!(
                "Last refresh:   {}",
                fetched.as_deref().unwrap_or("never")
            );
            println!(
                "Marked:         {} interested, {} in progress, {} unwanted",
                counts.interested, counts.in_progress, counts.unwanted
            );
        }
        Commands::Mark { github_id, status } => {
            let status = match status.as_str() {
                "clear" => None,
                other => Some(IssueStatusKind::parse(other).with_context(|| {
                    format!("unknown status '{}', expected interested, in_progress, unwanted, or clear", other)
                })?),
            };
            store.set_issue_status(github_id, status)?;
            println!("Updated issue {}", github_id);
        }
        Commands::Settings(command) => run_settings(command, &store)?,
    }

    Ok(())
}

fn run_settings(command: SettingsCommand, store: &Store) -> anyhow::Result<()> {
    match command {
        SettingsCommand::GetQuery => {
            println!("{}", store.search_query());
        }
        SettingsCommand::SetQuery { query } => {
            store.set_setting(&Setting::SearchQuery { query: query.clone() })?;
            println!("Search query set to: {}", query);
        }
        SettingsCommand::HideRepo { name } => {
            store.set_repository_hidden(&name, true)?;
            println!("Hidden: {}", name);
        }
        SettingsCommand::ShowRepo { name } => {
            store.set_repository_hidden(&name, false)?;
            println!("Visible: {}", name);
        }
        SettingsCommand::ListRepos => {
            for repo in store.repositories()? {
                let marker = if repo.is_hidden { " (hidden)" } else { "" };
                println!(
                    "  {}{} [{}]",
                    repo.name,
                    marker,
                    repo.language.as_deref().unwrap_or("Unknown")
                );
            }
        }
    }
    Ok(())
}

fn build_orchestrator(config: &Config, store: Arc<Store>) -> RefreshOrchestrator {
    let client = GitHubClient::with_base_url(
        config.github.token.clone(),
        config.github.api_url.clone(),
    );
    let source = Arc::new(GitHubIssueSource::new(client));

    let ranking = RankingEngine::new(
        RankingConfig {
            fetch_comments: config.fetch.fetch_comments,
            ..Default::default()
        },
        Arc::new(LanguageCache::new()),
    );

    let options = RefreshOptions {
        per_page: config.fetch.per_page,
        max_pages: config.fetch.max_pages,
        timeout_secs: config.refresh.timeout_secs,
        token_present: config.github.token.is_some(),
    };

    RefreshOrchestrator::new(source, store, ranking, options)
}

fn parse_status_filter(value: &str) -> anyhow::Result<StatusFilter> {
    match value {
        "interested" => Ok(StatusFilter::Interested),
        "in_progress" => Ok(StatusFilter::InProgress),
        "no_status" => Ok(StatusFilter::NoStatus),
        other => anyhow::bail!(
            "unknown status filter '{}', expected interested, in_progress, or no_status",
            other
        ),
    }
}

fn print_report(report: &bountyscout_core::RefreshReport) {
    match report.outcome {
        bountyscout_core::RefreshOutcome::Completed => {
            if let Some(sync) = &report.sync {
                println!(
                    "Refreshed: {} fetched, {} ranked, {} new, {} updated, {} skipped, {} pruned ({}ms)",
                    report.fetched,
                    report.ranked,
                    sync.inserted,
                    sync.updated,
                    sync.skipped_low_score,
                    sync.pruned,
                    report.elapsed_ms
                );
            } else {
                println!("Refreshed: nothing matched the search query");
            }
        }
        bountyscout_core::RefreshOutcome::Skipped => {
            println!("A refresh is already running, skipped");
        }
        bountyscout_core::RefreshOutcome::TimedOut => {
            println!(
                "Refresh timed out after {}ms; partial results were kept",
                report.elapsed_ms
            );
        }
        bountyscout_core::RefreshOutcome::Failed => {
            println!(
                "Refresh failed: {}",
                report.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}
