use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod client;
pub mod paginate;
pub mod retry;
#[cfg(test)]
pub mod testing;

pub use client::{ClientError, GitHubClient};
pub use paginate::{paginate, Interrupted, Page, PER_PAGE};
pub use retry::{retry_with_backoff, RetryPolicy};

/// Read-only view of the GitHub REST and search APIs used by the collectors.
pub trait GitHubApi {
    /// One page of commits on the default branch authored by `author` since `since`.
    async fn list_commits(
        &self,
        repo: &RepoId,
        author: &str,
        since: DateTime<Utc>,
        page: u32,
    ) -> Result<Page<CommitSummary>, ClientError>;

    /// Full commit including per-file diff stats.
    async fn get_commit(&self, repo: &RepoId, sha: &str) -> Result<CommitDetail, ClientError>;

    /// One page of issues (pull requests included) created by `creator`.
    async fn list_issues(
        &self,
        repo: &RepoId,
        creator: &str,
        state: IssueState,
        since: DateTime<Utc>,
        page: u32,
    ) -> Result<Page<Issue>, ClientError>;

    /// One page of the issue search for `query`, newest first.
    async fn search_issues(&self, query: &str, page: u32) -> Result<Page<Issue>, ClientError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid repository '{0}', expected owner/name")]
pub struct InvalidRepoId(pub String);

/// `owner/name` pair identifying a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Extract the repository from an API url such as
    /// `https://api.github.com/repos/owner/name`.
    pub fn from_api_url(url: &str) -> Option<Self> {
        let mut segments = url.trim_end_matches('/').rsplit('/');
        let name = segments.next()?;
        let owner = segments.next()?;
        if owner.is_empty() || name.is_empty() || owner.contains(':') {
            return None;
        }
        Some(Self::new(owner, name))
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn belongs_to(&self, organization: &str) -> bool {
        self.owner.eq_ignore_ascii_case(organization)
    }
}

impl FromStr for RepoId {
    type Err = InvalidRepoId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        match parts.as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => {
                Ok(Self::new(*owner, *name))
            }
            _ => Err(InvalidRepoId(s.to_string())),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
        }
    }
}

/// User as returned by GitHub API
#[derive(Debug, Clone, Deserialize)]
pub struct GithubUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitParent {
    pub sha: String,
}

/// Commit as listed by `/repos/{owner}/{repo}/commits`
#[derive(Debug, Clone, Deserialize)]
pub struct CommitSummary {
    pub sha: String,
    /// Linked GitHub account; absent when the commit email maps to no user.
    pub author: Option<GithubUser>,
    #[serde(default)]
    pub parents: Vec<CommitParent>,
}

impl CommitSummary {
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn authored_by(&self, login: &str) -> bool {
        self.author
            .as_ref()
            .is_some_and(|a| a.login.eq_ignore_ascii_case(login))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitFile {
    pub filename: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub changes: u64,
}

/// Single commit with file-level diff stats
#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetail {
    pub sha: String,
    #[serde(default)]
    pub files: Vec<CommitFile>,
}

impl CommitDetail {
    /// Hits of code: additions plus changes over every touched file.
    pub fn hits_of_code(&self) -> u64 {
        self.files.iter().map(|f| f.additions + f.changes).sum()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestRef {
    pub merged_at: Option<DateTime<Utc>>,
}

/// Issue or pull request as returned by the issues and search endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: u64,
    pub pull_request: Option<PullRequestRef>,
    #[serde(default)]
    pub repository_url: String,
}

impl Issue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    /// Hours between creation and closure, when both are known.
    pub fn lifecycle_hours(&self) -> Option<f64> {
        let created = self.created_at?;
        let closed = self.closed_at?;
        Some((closed - created).num_seconds() as f64 / 3600.0)
    }
}

/// Envelope of `/search/issues`
#[derive(Debug, Deserialize)]
pub struct SearchResults {
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    pub items: Vec<Issue>,
}
