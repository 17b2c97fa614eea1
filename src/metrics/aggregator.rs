use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::{discover_repositories, MetricCollector, UserMetrics, Window};
use crate::config::Settings;
use crate::github::{GitHubApi, RepoId, RetryPolicy};

/// Walks every configured user and repository, folding collector results
/// into per-user totals.
pub struct Aggregator<'a, C> {
    api: &'a C,
    settings: &'a Settings,
    collector: MetricCollector<'a, C>,
    retry: RetryPolicy,
}

impl<'a, C: GitHubApi> Aggregator<'a, C> {
    pub fn new(api: &'a C, settings: &'a Settings, window: Window) -> Self {
        let retry = RetryPolicy::new(settings.rate_limit_buffer());
        Self {
            api,
            settings,
            collector: MetricCollector::new(api, retry, window),
            retry,
        }
    }

    /// Totals for every configured user, keyed by login.
    pub async fn run(&self) -> BTreeMap<String, UserMetrics> {
        info!(
            "Calculating {} metric for {} users for {} days",
            self.settings.metric,
            self.settings.users.len(),
            self.settings.days
        );

        let mut metrics = BTreeMap::new();
        for user in &self.settings.users {
            let totals = self.measure_user(user).await;
            info!("User {} scored {}", user, totals.score);
            metrics.insert(user.clone(), totals);
        }
        metrics
    }

    pub async fn measure_user(&self, user: &str) -> UserMetrics {
        let repos = self.repositories_for(user).await;
        let mut totals = UserMetrics::default();

        let pb = ProgressBar::new(repos.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} repositories {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );

        for name in &repos {
            pb.set_message(format!("{} @ {}", user, name));
            let repo: RepoId = match name.parse() {
                Ok(repo) => repo,
                Err(err) => {
                    warn!("Skipping {}", err);
                    pb.inc(1);
                    continue;
                }
            };

            let contribution = self
                .collector
                .collect(self.settings.metric, &repo, user)
                .await;
            totals.absorb(&contribution);
            pb.inc(1);
        }

        pb.finish_and_clear();
        totals
    }

    /// Configured repositories when given, otherwise the ones discovered
    /// through search.
    async fn repositories_for(&self, user: &str) -> Vec<String> {
        if !self.settings.repos.is_empty() {
            return self.settings.repos.clone();
        }

        discover_repositories(
            self.api,
            &self.retry,
            self.collector.window(),
            user,
            self.settings.organization.as_deref(),
        )
        .await
        .into_iter()
        .map(|repo| repo.full_name())
        .collect()
    }
}
