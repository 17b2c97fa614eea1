use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::output::OutputFormat;

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = ".githubmetrics.toml";

const ENV_PREFIX: &str = "GITHUBMETRICS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Commits,
    Hoc,
    Issues,
    Lcp,
    Msgs,
    Pulls,
    Reviews,
    All,
}

impl Metric {
    pub const ALL_NAMES: [&'static str; 8] = [
        "commits", "hoc", "issues", "lcp", "msgs", "pulls", "reviews", "all",
    ];

    /// Whether collecting `self` requires the collector for `other`.
    pub fn includes(self, other: Metric) -> bool {
        self == Metric::All || self == other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Commits => "commits",
            Metric::Hoc => "hoc",
            Metric::Issues => "issues",
            Metric::Lcp => "lcp",
            Metric::Msgs => "msgs",
            Metric::Pulls => "pulls",
            Metric::Reviews => "reviews",
            Metric::All => "all",
        }
    }
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let metric = match s.trim().to_lowercase().as_str() {
            "commits" => Metric::Commits,
            "hoc" => Metric::Hoc,
            "issues" => Metric::Issues,
            "lcp" => Metric::Lcp,
            "msgs" => Metric::Msgs,
            "pulls" => Metric::Pulls,
            "reviews" => Metric::Reviews,
            "all" => Metric::All,
            other => bail!(
                "Unknown metric: {} (expected one of {})",
                other,
                Self::ALL_NAMES.join(", ")
            ),
        };
        Ok(metric)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable run settings, built once in `main` and borrowed by every component.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub days: u32,
    pub users: Vec<String>,
    pub repos: Vec<String>,
    pub organization: Option<String>,
    pub metric: Metric,
    /// Extra seconds slept past a rate-limit reset.
    pub delay_secs: u64,
    pub verbose: bool,
    pub output: String,
    pub format: OutputFormat,
    pub template: Option<PathBuf>,
    pub api_url: String,
    pub web_url: String,
}

/// Values as they appear in the config file and `GITHUBMETRICS_*` variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct FileSettings {
    token: Option<String>,
    days: u32,
    users: Vec<String>,
    repos: Vec<String>,
    organization: Option<String>,
    metric: String,
    delay: u64,
    verbose: bool,
    output: String,
    format: String,
    template: Option<PathBuf>,
    api_url: String,
    web_url: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            token: None,
            days: 30,
            users: Vec::new(),
            repos: Vec::new(),
            organization: None,
            metric: "all".to_string(),
            delay: 30,
            verbose: false,
            output: "metrics".to_string(),
            format: "html".to_string(),
            template: None,
            api_url: "https://api.github.com".to_string(),
            web_url: "https://github.com".to_string(),
        }
    }
}

/// Explicit command-line values. `None` / empty means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub token: Option<String>,
    pub days: Option<u32>,
    pub users: Vec<String>,
    pub repos: Vec<String>,
    pub organization: Option<String>,
    pub metric: Option<String>,
    pub delay: Option<u64>,
    pub verbose: bool,
    pub output: Option<String>,
    pub format: Option<String>,
    pub template: Option<PathBuf>,
    pub api_url: Option<String>,
    pub web_url: Option<String>,
}

impl Settings {
    /// Layer defaults, the config file, the environment and finally `overrides`.
    pub fn load(config_path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        Self::load_with_env(config_path, ENV_PREFIX, overrides)
    }

    fn load_with_env(
        config_path: Option<&Path>,
        env_prefix: &str,
        overrides: Overrides,
    ) -> Result<Self> {
        let file_source = match config_path {
            Some(path) => config::File::new(&path.to_string_lossy(), config::FileFormat::Toml)
                .required(true),
            None => config::File::new(DEFAULT_CONFIG_FILE, config::FileFormat::Toml)
                .required(false),
        };

        let raw: FileSettings = config::Config::builder()
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("users")
                    .with_list_parse_key("repos"),
            )
            .build()
            .with_context(|| match config_path {
                Some(path) => format!("Failed to read config file {}", path.display()),
                None => "Failed to load configuration".to_string(),
            })?
            .try_deserialize()
            .context("Invalid configuration values")?;

        Self::merge(raw, overrides)
    }

    fn merge(raw: FileSettings, overrides: Overrides) -> Result<Self> {
        let metric_name = overrides.metric.unwrap_or(raw.metric);
        let metric = metric_name.parse::<Metric>()?;

        let token = overrides
            .token
            .or(raw.token)
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.trim().is_empty());

        let settings = Self {
            token,
            days: overrides.days.unwrap_or(raw.days),
            users: if overrides.users.is_empty() {
                raw.users
            } else {
                overrides.users
            },
            repos: if overrides.repos.is_empty() {
                raw.repos
            } else {
                overrides.repos
            },
            organization: overrides
                .organization
                .or(raw.organization)
                .filter(|o| !o.trim().is_empty()),
            metric,
            delay_secs: overrides.delay.unwrap_or(raw.delay),
            verbose: overrides.verbose || raw.verbose,
            output: overrides.output.unwrap_or(raw.output),
            format: OutputFormat::from(overrides.format.unwrap_or(raw.format).as_str()),
            template: overrides.template.or(raw.template),
            api_url: overrides
                .api_url
                .unwrap_or(raw.api_url)
                .trim_end_matches('/')
                .to_string(),
            web_url: overrides
                .web_url
                .unwrap_or(raw.web_url)
                .trim_end_matches('/')
                .to_string(),
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.days == 0 {
            bail!("--days must be at least 1");
        }
        if self.repos.is_empty() && self.organization.is_none() {
            bail!(
                "No repositories or organization specified. Use --repo to add repositories or --organization to filter by organization."
            );
        }
        Ok(())
    }

    pub fn rate_limit_buffer(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}
