//! In-memory GitHub used by the collector, discovery and aggregator tests.

use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use super::*;

#[derive(Default)]
pub struct FakeGitHub {
    commits: HashMap<RepoId, Vec<Vec<CommitSummary>>>,
    details: HashMap<String, CommitDetail>,
    issues: HashMap<(RepoId, IssueState), Vec<Vec<Issue>>>,
    searches: HashMap<String, Vec<Vec<Issue>>>,
    broken: HashSet<String>,
    requests: RefCell<Vec<String>>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commits(mut self, repo: &str, pages: Vec<Vec<CommitSummary>>) -> Self {
        self.commits.insert(repo_id(repo), pages);
        self
    }

    pub fn with_detail(mut self, detail: CommitDetail) -> Self {
        self.details.insert(detail.sha.clone(), detail);
        self
    }

    pub fn with_issues(mut self, repo: &str, state: IssueState, pages: Vec<Vec<Issue>>) -> Self {
        self.issues.insert((repo_id(repo), state), pages);
        self
    }

    pub fn with_search(mut self, query: &str, pages: Vec<Vec<Issue>>) -> Self {
        self.searches.insert(query.to_string(), pages);
        self
    }

    /// Every request mentioning `needle` (a repository or a query) fails.
    pub fn broken(mut self, needle: &str) -> Self {
        self.broken.insert(needle.to_string());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn requests_matching(&self, prefix: &str) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.starts_with(prefix))
            .count()
    }

    fn record(&self, request: String) -> Result<(), ClientError> {
        let failing = self.broken.iter().any(|needle| request.contains(needle));
        self.requests.borrow_mut().push(request);
        if failing {
            return Err(ClientError::Api {
                status: 500,
                message: "simulated outage".to_string(),
            });
        }
        Ok(())
    }
}

fn serve<T: Clone>(pages: Option<&Vec<Vec<T>>>, page: u32) -> Page<T> {
    let pages = match pages {
        Some(pages) => pages,
        None => {
            return Page {
                items: Vec::new(),
                next_page: None,
            }
        }
    };
    let idx = page as usize - 1;
    let items = pages.get(idx).cloned().unwrap_or_default();
    let next_page = (idx + 1 < pages.len()).then_some(page + 1);
    Page { items, next_page }
}

impl GitHubApi for FakeGitHub {
    async fn list_commits(
        &self,
        repo: &RepoId,
        _author: &str,
        _since: DateTime<Utc>,
        page: u32,
    ) -> Result<Page<CommitSummary>, ClientError> {
        self.record(format!("commits {} page={}", repo, page))?;
        Ok(serve(self.commits.get(repo), page))
    }

    async fn get_commit(&self, repo: &RepoId, sha: &str) -> Result<CommitDetail, ClientError> {
        self.record(format!("commit {} {}", repo, sha))?;
        self.details
            .get(sha)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(sha.to_string()))
    }

    async fn list_issues(
        &self,
        repo: &RepoId,
        _creator: &str,
        state: IssueState,
        _since: DateTime<Utc>,
        page: u32,
    ) -> Result<Page<Issue>, ClientError> {
        self.record(format!("issues {} {} page={}", repo, state.as_str(), page))?;
        Ok(serve(self.issues.get(&(repo.clone(), state)), page))
    }

    async fn search_issues(&self, query: &str, page: u32) -> Result<Page<Issue>, ClientError> {
        self.record(format!("search {} page={}", query, page))?;
        Ok(serve(self.searches.get(query), page))
    }
}

fn repo_id(repo: &str) -> RepoId {
    repo.parse().unwrap()
}

pub fn commit(sha: &str, login: &str, parents: usize) -> CommitSummary {
    CommitSummary {
        sha: sha.to_string(),
        author: Some(GithubUser {
            login: login.to_string(),
        }),
        parents: (0..parents)
            .map(|i| CommitParent {
                sha: format!("{}^{}", sha, i + 1),
            })
            .collect(),
    }
}

/// Commit detail with one file per `(additions, deletions)` pair.
pub fn detail(sha: &str, files: &[(u64, u64)]) -> CommitDetail {
    CommitDetail {
        sha: sha.to_string(),
        files: files
            .iter()
            .enumerate()
            .map(|(i, &(additions, deletions))| CommitFile {
                filename: format!("src/file{}.rs", i),
                additions,
                deletions,
                changes: additions + deletions,
            })
            .collect(),
    }
}

pub fn issue(number: u64, repo: &str) -> Issue {
    Issue {
        number,
        title: format!("Issue #{}", number),
        created_at: None,
        closed_at: None,
        comments: 0,
        pull_request: None,
        repository_url: format!("https://api.github.com/repos/{}", repo),
    }
}

pub fn pull(number: u64, repo: &str) -> Issue {
    Issue {
        pull_request: Some(PullRequestRef::default()),
        ..issue(number, repo)
    }
}
