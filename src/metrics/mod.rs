use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod aggregator;
pub mod collectors;
pub mod discovery;

pub use aggregator::Aggregator;
pub use collectors::MetricCollector;
pub use discovery::discover_repositories;

use crate::github::RepoId;

pub const HOC_WEIGHT: u64 = 1;
pub const PULLS_WEIGHT: u64 = 250;
pub const ISSUES_WEIGHT: u64 = 50;
pub const COMMITS_WEIGHT: u64 = 5;
pub const REVIEWS_WEIGHT: u64 = 150;
pub const MSGS_WEIGHT: u64 = 5;

/// Number of repositories listed in a user's top-contributions column.
pub const TOP_REPOSITORIES: usize = 3;

/// Trailing period within which contributions are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub days: u32,
    pub since: DateTime<Utc>,
}

impl Window {
    pub fn trailing(days: u32, now: DateTime<Utc>) -> Self {
        Self {
            days,
            since: now - Duration::days(i64::from(days)),
        }
    }

    /// Window start as used by search qualifiers (`created:>2026-01-31`).
    pub fn since_date(&self) -> String {
        self.since.format("%Y-%m-%d").to_string()
    }
}

/// What one repository added to a user's totals.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoContribution {
    pub repo: RepoId,
    pub commits: u64,
    pub hoc: u64,
    pub issues: u64,
    pub lcp: f64,
    pub msgs: u64,
    pub pulls: u64,
    pub reviews: u64,
}

impl RepoContribution {
    pub fn new(repo: RepoId) -> Self {
        Self {
            repo,
            commits: 0,
            hoc: 0,
            issues: 0,
            lcp: 0.0,
            msgs: 0,
            pulls: 0,
            reviews: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetrics {
    pub commits: u64,
    pub hoc: u64,
    pub issues: u64,
    /// Sum of per-repository average pull-request lifecycles, in hours.
    pub lcp: f64,
    pub msgs: u64,
    pub pulls: u64,
    pub reviews: u64,
    pub score: u64,
    /// Hits of code per `owner/name`.
    pub repo_hoc: HashMap<String, u64>,
}

impl UserMetrics {
    /// Add one repository's values and refresh the score.
    pub fn absorb(&mut self, contribution: &RepoContribution) {
        self.commits += contribution.commits;
        self.hoc += contribution.hoc;
        self.issues += contribution.issues;
        self.lcp += contribution.lcp;
        self.msgs += contribution.msgs;
        self.pulls += contribution.pulls;
        self.reviews += contribution.reviews;

        if contribution.hoc > 0 {
            *self
                .repo_hoc
                .entry(contribution.repo.full_name())
                .or_insert(0) += contribution.hoc;
        }

        self.score = self.compute_score();
    }

    /// Weighted sum of the six counted metrics. Lifecycle is informational.
    pub fn compute_score(&self) -> u64 {
        self.hoc * HOC_WEIGHT
            + self.pulls * PULLS_WEIGHT
            + self.issues * ISSUES_WEIGHT
            + self.commits * COMMITS_WEIGHT
            + self.reviews * REVIEWS_WEIGHT
            + self.msgs * MSGS_WEIGHT
    }

    /// Repositories with the most hits of code, highest first.
    pub fn top_repositories(&self, limit: usize) -> Vec<(&str, u64)> {
        let mut repos: Vec<(&str, u64)> = self
            .repo_hoc
            .iter()
            .map(|(repo, &hoc)| (repo.as_str(), hoc))
            .collect();
        repos.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        repos.truncate(limit);
        repos
    }

    /// `owner/name(lines)` entries of [`Self::top_repositories`], comma separated.
    pub fn top_repositories_label(&self) -> String {
        self.top_repositories(TOP_REPOSITORIES)
            .iter()
            .map(|(repo, hoc)| format!("{}({})", repo, hoc))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
