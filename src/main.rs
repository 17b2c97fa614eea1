use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

mod config;
mod github;
mod metrics;
mod output;

use config::{Overrides, Settings};
use github::GitHubClient;
use metrics::{Aggregator, Window};
use output::{Report, Reporter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (TOML). Defaults to .githubmetrics.toml when present
    #[arg(short, long, env = "GITHUBMETRICS_CONFIG")]
    config: Option<PathBuf>,

    /// GitHub token (falls back to GITHUB_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Number of days to measure
    #[arg(short, long)]
    days: Option<u32>,

    /// GitHub username to measure (repeatable)
    #[arg(short, long = "user", visible_alias = "coder")]
    users: Vec<String>,

    /// Repository to measure as owner/name (repeatable); skips discovery
    #[arg(short, long = "repo")]
    repos: Vec<String>,

    /// Only count repositories owned by this organization
    #[arg(long)]
    organization: Option<String>,

    /// Metric to calculate (commits, hoc, issues, lcp, msgs, pulls, reviews, all)
    #[arg(short, long)]
    metric: Option<String>,

    /// Seconds to wait past a rate-limit reset
    #[arg(long)]
    delay: Option<u64>,

    /// Output format (html, json)
    #[arg(short, long)]
    format: Option<String>,

    /// Output file (metrics.html|json)
    #[arg(short, long)]
    output: Option<String>,

    /// Custom tera template replacing the built-in report
    #[arg(long)]
    template: Option<PathBuf>,

    /// GitHub API base URL (for GitHub Enterprise)
    #[arg(long)]
    api_url: Option<String>,

    /// GitHub web URL used for report links
    #[arg(long)]
    web_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(self) -> (Option<PathBuf>, Overrides) {
        let overrides = Overrides {
            token: self.token,
            days: self.days,
            users: self.users,
            repos: self.repos,
            organization: self.organization,
            metric: self.metric,
            delay: self.delay,
            verbose: self.verbose,
            output: self.output,
            format: self.format,
            template: self.template,
            api_url: self.api_url,
            web_url: self.web_url,
        };
        (self.config, overrides)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let (config_path, overrides) = Cli::parse().overrides();
    let settings = Settings::load(config_path.as_deref(), overrides)?;

    // Initialize logging
    let level = if settings.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::from_level(level).into())
                .from_env_lossy(),
        )
        .with_target(false)
        .init();

    println!(
        "{}",
        "ghmetrics - GitHub Contribution Metrics".bright_cyan().bold()
    );
    println!(
        "Users: {}",
        settings.users.join(", ").bright_white()
    );
    if let Some(org) = &settings.organization {
        println!("Organization: {}", org.bright_white());
    }

    let mut reporter = Reporter::new(
        settings.format,
        &settings.output,
        settings.template.as_deref(),
    )?;
    let client = GitHubClient::new(&settings.api_url, settings.token.clone())?;
    let window = Window::trailing(settings.days, Utc::now());

    info!(
        "Measuring {} since {}",
        settings.metric,
        window.since_date()
    );

    let metrics = Aggregator::new(&client, &settings, window).run().await;
    let report = Report::build(&metrics, &settings, &window);
    reporter.generate_report(&report).await?;

    println!(
        "\n{} {}",
        "Report written to".bright_green().bold(),
        reporter.output_path().bright_white()
    );

    Ok(())
}
