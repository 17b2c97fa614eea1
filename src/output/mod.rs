use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod html;
pub mod links;
pub mod reporter;

pub use links::{MetricLinks, SearchLinker};
pub use reporter::Reporter;

use crate::config::{Metric, Settings};
use crate::metrics::{UserMetrics, Window};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Html,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "html" => OutputFormat::Html,
            _ => OutputFormat::Html,
        }
    }
}

pub fn add_file_extension(path: &str, format: &OutputFormat) -> String {
    let extension = match format {
        OutputFormat::Html => ".html",
        OutputFormat::Json => ".json",
    };

    if path.ends_with(extension) {
        path.to_string()
    } else {
        format!("{}{}", path, extension)
    }
}

pub trait OutputGenerator {
    async fn generate(&mut self, report: &Report) -> Result<String>;
}

/// One ranked line of the report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub rank: usize,
    pub user: String,
    pub commits: u64,
    pub hoc: u64,
    pub issues: u64,
    pub lcp: f64,
    pub msgs: u64,
    pub pulls: u64,
    pub reviews: u64,
    pub score: u64,
    pub top_repositories: String,
    pub links: MetricLinks,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub days: u32,
    pub since: String,
    pub organization: Option<String>,
    pub metric: Metric,
    pub rows: Vec<ReportRow>,
}

impl Report {
    /// Rank users by descending score. Ties keep the map's login order.
    pub fn build(
        metrics: &BTreeMap<String, UserMetrics>,
        settings: &Settings,
        window: &Window,
    ) -> Self {
        let linker = SearchLinker::new(
            &settings.web_url,
            window,
            settings.organization.as_deref(),
        );

        let mut ranked: Vec<(&String, &UserMetrics)> = metrics.iter().collect();
        ranked.sort_by(|a, b| b.1.score.cmp(&a.1.score));

        let rows = ranked
            .into_iter()
            .enumerate()
            .map(|(i, (user, m))| ReportRow {
                rank: i + 1,
                user: user.clone(),
                commits: m.commits,
                hoc: m.hoc,
                issues: m.issues,
                lcp: m.lcp,
                msgs: m.msgs,
                pulls: m.pulls,
                reviews: m.reviews,
                score: m.score,
                top_repositories: m.top_repositories_label(),
                links: linker.links_for(user),
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            days: window.days,
            since: window.since_date(),
            organization: settings.organization.clone(),
            metric: settings.metric,
            rows,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::metrics::RepoContribution;
    use chrono::TimeZone;

    pub fn settings() -> Settings {
        Settings {
            token: None,
            days: 30,
            users: vec![],
            repos: vec![],
            organization: Some("acme".to_string()),
            metric: Metric::All,
            delay_secs: 0,
            verbose: false,
            output: "metrics".to_string(),
            format: OutputFormat::Html,
            template: None,
            api_url: "https://api.github.com".to_string(),
            web_url: "https://github.com".to_string(),
        }
    }

    pub fn window() -> Window {
        Window::trailing(30, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap())
    }

    fn user(commits: u64, hoc: u64, repo: &str) -> UserMetrics {
        let mut metrics = UserMetrics::default();
        metrics.absorb(&RepoContribution {
            commits,
            hoc,
            ..RepoContribution::new(repo.parse().unwrap())
        });
        metrics
    }

    pub fn sample_metrics() -> BTreeMap<String, UserMetrics> {
        let mut metrics = BTreeMap::new();
        metrics.insert("zoe".to_string(), user(1, 10, "acme/api"));
        metrics.insert("amy".to_string(), user(2, 400, "acme/web"));
        metrics.insert("bob".to_string(), user(1, 10, "acme/cli"));
        metrics.insert("cy".to_string(), UserMetrics::default());
        metrics
    }

    #[test]
    fn test_add_file_extension() {
        assert_eq!(add_file_extension("metrics", &OutputFormat::Html), "metrics.html");
        assert_eq!(add_file_extension("out.json", &OutputFormat::Json), "out.json");
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("pdf"), OutputFormat::Html);
    }

    #[test]
    fn test_rows_sorted_by_score_descending() {
        let report = Report::build(&sample_metrics(), &settings(), &window());
        let order: Vec<_> = report.rows.iter().map(|r| r.user.as_str()).collect();

        // bob and zoe tie and keep alphabetical order
        assert_eq!(order, vec!["amy", "bob", "zoe", "cy"]);
        assert_eq!(report.rows[0].rank, 1);
        assert_eq!(report.rows[0].score, 410);
        assert_eq!(report.rows[0].top_repositories, "acme/web(400)");
        assert_eq!(report.rows[3].top_repositories, "");
        assert_eq!(report.since, "2026-01-30");
    }
}
