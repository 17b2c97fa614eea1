use tracing::{debug, info, warn};

use super::{RepoContribution, Window};
use crate::config::Metric;
use crate::github::{
    paginate, retry_with_backoff, GitHubApi, Interrupted, Issue, IssueState, RepoId, RetryPolicy,
};

/// Runs the per-repository metric queries for one user within a window.
pub struct MetricCollector<'a, C> {
    api: &'a C,
    retry: RetryPolicy,
    window: Window,
}

/// Keep whatever was gathered before pagination gave up.
fn settle<A>(what: &str, result: Result<A, Interrupted<A>>) -> A {
    result.unwrap_or_else(|interrupted| {
        warn!(
            "Error fetching {} (page {}): {}",
            what, interrupted.page, interrupted.source
        );
        interrupted.partial
    })
}

impl<'a, C: GitHubApi> MetricCollector<'a, C> {
    pub fn new(api: &'a C, retry: RetryPolicy, window: Window) -> Self {
        Self { api, retry, window }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Collect `metric` (or every metric for [`Metric::All`]) for one repository.
    pub async fn collect(&self, metric: Metric, repo: &RepoId, user: &str) -> RepoContribution {
        let mut contribution = RepoContribution::new(repo.clone());

        if metric.includes(Metric::Commits) {
            contribution.commits = self.commits(repo, user).await;
        }
        if metric.includes(Metric::Hoc) {
            contribution.hoc = self.hits_of_code(repo, user).await;
        }
        if metric.includes(Metric::Issues) {
            contribution.issues = self.issues(repo, user).await;
        }
        if metric.includes(Metric::Lcp) {
            contribution.lcp = self.pull_lifecycle(repo, user).await;
        }
        if metric.includes(Metric::Msgs) {
            contribution.msgs = self.comments(repo, user).await;
        }
        if metric.includes(Metric::Pulls) {
            contribution.pulls = self.pulls(repo, user).await;
        }
        if metric.includes(Metric::Reviews) {
            contribution.reviews = self.reviews(repo, user).await;
        }

        contribution
    }

    /// SHAs of non-merge commits authored by `user` in the window.
    async fn authored_commits(&self, repo: &RepoId, user: &str) -> Vec<String> {
        let what = format!("commits for user {} in repo {}", user, repo);
        let since = self.window.since;
        let result = paginate(
            &self.retry,
            &what,
            |page| self.api.list_commits(repo, user, since, page),
            Vec::new(),
            |mut shas, commit| {
                if !commit.authored_by(user) {
                    return shas;
                }
                if commit.is_merge() {
                    let parents: Vec<&str> = commit.parents.iter().map(|p| p.sha.as_str()).collect();
                    debug!("Skipping merge commit {} of {}", commit.sha, parents.join(", "));
                    return shas;
                }
                debug!("Found commit {} by {} in repo {}", commit.sha, user, repo);
                shas.push(commit.sha);
                shas
            },
        )
        .await;
        settle(&what, result)
    }

    pub async fn commits(&self, repo: &RepoId, user: &str) -> u64 {
        self.authored_commits(repo, user).await.len() as u64
    }

    /// Hits of code over the user's non-merge commits. Needs one extra request
    /// per commit for its diff stats.
    pub async fn hits_of_code(&self, repo: &RepoId, user: &str) -> u64 {
        let mut hoc = 0;
        for sha in self.authored_commits(repo, user).await {
            let what = format!("commit details for {} in {}", sha, repo);
            match retry_with_backoff(&self.retry, &what, || self.api.get_commit(repo, &sha)).await {
                Ok(detail) => {
                    for file in &detail.files {
                        debug!(
                            "Commit {}: file {} - additions: {}, deletions: {}, changes: {}",
                            detail.sha, file.filename, file.additions, file.deletions, file.changes
                        );
                    }
                    hoc += detail.hits_of_code();
                }
                Err(err) => warn!("Error fetching {}: {}", what, err),
            }
        }
        hoc
    }

    /// Open issues created by the user in the window, pull requests excluded.
    pub async fn issues(&self, repo: &RepoId, user: &str) -> u64 {
        let what = format!("issues for user {} in repo {}", user, repo);
        let since = self.window.since;
        let result = paginate(
            &self.retry,
            &what,
            |page| self.api.list_issues(repo, user, IssueState::Open, since, page),
            0u64,
            |n, issue| if issue.is_pull_request() { n } else { n + 1 },
        )
        .await;
        settle(&what, result)
    }

    /// Mean hours from creation to closure over the user's closed pull
    /// requests. Zero when there are none or the listing fails.
    pub async fn pull_lifecycle(&self, repo: &RepoId, user: &str) -> f64 {
        let what = format!("closed pull requests for user {} in repo {}", user, repo);
        let since = self.window.since;
        let result = paginate(
            &self.retry,
            &what,
            |page| self.api.list_issues(repo, user, IssueState::Closed, since, page),
            (0.0f64, 0u64),
            |(total, count), issue| {
                if !issue.is_pull_request() {
                    return (total, count);
                }
                match issue.lifecycle_hours() {
                    Some(hours) => {
                        debug!(
                            "Pull request #{} '{}' by {}: duration {:.2} hours",
                            issue.number, issue.title, user, hours
                        );
                        (total + hours, count + 1)
                    }
                    None => (total, count),
                }
            },
        )
        .await;

        let (total, count) = match result {
            Ok(sums) => sums,
            Err(interrupted) => {
                warn!("Error fetching {}: {}", what, interrupted.source);
                return 0.0;
            }
        };
        if count == 0 {
            return 0.0;
        }

        let average = total / count as f64;
        info!(
            "Average lifecycle of pull requests for user {} in repo {} over the last {} days: {:.2} hours",
            user, repo, self.window.days, average
        );
        average
    }

    /// Comment counts of pull requests the user commented on.
    pub async fn comments(&self, repo: &RepoId, user: &str) -> u64 {
        let query = format!(
            "repo:{} is:pr commenter:{} created:>{}",
            repo,
            user,
            self.window.since_date()
        );
        let result = self
            .search(&query, 0u64, |n, pr| {
                debug!("Pull request #{} in repo {} has {} comments", pr.number, repo, pr.comments);
                n + pr.comments
            })
            .await;
        settle(&query, result)
    }

    /// Pull requests authored by the user and merged in the window.
    pub async fn pulls(&self, repo: &RepoId, user: &str) -> u64 {
        let query = format!(
            "repo:{} is:pr author:{} merged:>{}",
            repo,
            user,
            self.window.since_date()
        );
        let result = self
            .search(&query, 0u64, |n, pr| {
                if pr.is_pull_request() && pr.closed_at.is_some() {
                    let merged_at = pr.pull_request.as_ref().and_then(|p| p.merged_at);
                    debug!(
                        "Pull request #{} by {} in repo {} was merged at {:?}",
                        pr.number, user, repo, merged_at
                    );
                    n + 1
                } else {
                    n
                }
            })
            .await;
        settle(&query, result)
    }

    /// Merged pull requests the user reviewed. Trusts the query's `merged:`
    /// qualifier and counts every hit.
    pub async fn reviews(&self, repo: &RepoId, user: &str) -> u64 {
        let query = format!(
            "repo:{} is:pr reviewed-by:{} merged:>{}",
            repo,
            user,
            self.window.since_date()
        );
        let result = self
            .search(&query, 0u64, |n, pr| {
                debug!("Pull request #{} reviewed by {} in repo {}", pr.number, user, repo);
                n + 1
            })
            .await;
        settle(&query, result)
    }

    async fn search<A, R>(&self, query: &str, init: A, reduce: R) -> Result<A, Interrupted<A>>
    where
        R: FnMut(A, Issue) -> A,
    {
        paginate(
            &self.retry,
            query,
            |page| self.api.search_issues(query, page),
            init,
            reduce,
        )
        .await
    }
}
