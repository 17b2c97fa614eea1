//! GitHub REST API client for the commit, issue and search endpoints

use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::{
    CommitDetail, CommitSummary, GitHubApi, Issue, IssueState, Page, RepoId, SearchResults,
    PER_PAGE,
};

const CLIENT_USER_AGENT: &str = concat!("ghmetrics/", env!("CARGO_PKG_VERSION"));
const DEFAULT_RATE_LIMIT_WAIT_SECS: i64 = 60;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Rate limited until {reset}")]
    RateLimited { reset: DateTime<Utc> },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// GitHub API client
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(api_url: &str, token: Option<String>) -> Result<Self, ClientError> {
        if token.is_none() {
            warn!("No GitHub token provided - rate limits will be very restrictive (60 req/hour)");
        }

        let client = reqwest::Client::builder()
            .user_agent(CLIENT_USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(ref token) = self.token {
            if let Ok(val) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, val);
            }
        }
        headers
    }

    /// GET `path` and decode the body, returning the next page number if the
    /// `Link` header advertises one.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<(T, Option<u32>), ClientError> {
        let url = format!("{}{}", self.api_url, path);
        debug!("GET {} {:?}", url, query);

        let resp = self
            .client
            .get(&url)
            .headers(self.headers())
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(url));
        }
        if status == reqwest::StatusCode::FORBIDDEN
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        {
            let reset = rate_limit_reset(resp.headers(), Utc::now());
            return Err(ClientError::RateLimited { reset });
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let next = resp
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_page);

        Ok((resp.json().await?, next))
    }
}

fn paging(page: u32) -> [(&'static str, String); 2] {
    [("per_page", PER_PAGE.to_string()), ("page", page.to_string())]
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl GitHubApi for GitHubClient {
    async fn list_commits(
        &self,
        repo: &RepoId,
        author: &str,
        since: DateTime<Utc>,
        page: u32,
    ) -> Result<Page<CommitSummary>, ClientError> {
        let path = format!("/repos/{}/{}/commits", repo.owner, repo.name);
        let mut query = vec![("author", author.to_string()), ("since", timestamp(since))];
        query.extend(paging(page));

        let (items, next_page) = self.get(&path, &query).await?;
        Ok(Page { items, next_page })
    }

    async fn get_commit(&self, repo: &RepoId, sha: &str) -> Result<CommitDetail, ClientError> {
        let path = format!("/repos/{}/{}/commits/{}", repo.owner, repo.name, sha);
        let (detail, _) = self.get(&path, &[]).await?;
        Ok(detail)
    }

    async fn list_issues(
        &self,
        repo: &RepoId,
        creator: &str,
        state: IssueState,
        since: DateTime<Utc>,
        page: u32,
    ) -> Result<Page<Issue>, ClientError> {
        let path = format!("/repos/{}/{}/issues", repo.owner, repo.name);
        let mut query = vec![
            ("creator", creator.to_string()),
            ("state", state.as_str().to_string()),
            ("since", timestamp(since)),
        ];
        query.extend(paging(page));

        let (items, next_page) = self.get(&path, &query).await?;
        Ok(Page { items, next_page })
    }

    async fn search_issues(&self, query: &str, page: u32) -> Result<Page<Issue>, ClientError> {
        let mut params = vec![
            ("q", query.to_string()),
            ("sort", "created".to_string()),
            ("order", "desc".to_string()),
        ];
        params.extend(paging(page));

        let (results, next_page): (SearchResults, _) = self.get("/search/issues", &params).await?;
        if results.incomplete_results {
            warn!(
                "Search '{}' returned incomplete results ({} total)",
                query, results.total_count
            );
        }
        Ok(Page {
            items: results.items,
            next_page,
        })
    }
}

/// Page number of the `rel="next"` entry of a `Link` header.
pub fn parse_next_page(link: &str) -> Option<u32> {
    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts
            .next()?
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>');
        if !parts.any(|p| p.trim() == r#"rel="next""#) {
            return None;
        }
        let url = Url::parse(target).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok())
    })
}

/// When the current rate-limit window ends, from `retry-after` (seconds, sent
/// on secondary limits) or `x-ratelimit-reset` (epoch seconds), defaulting to
/// one minute from `now`.
pub fn rate_limit_reset(headers: &HeaderMap, now: DateTime<Utc>) -> DateTime<Utc> {
    let header = |name: &str| -> Option<i64> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    };

    if let Some(wait) = header("retry-after") {
        return now + ChronoDuration::seconds(wait);
    }
    header("x-ratelimit-reset")
        .and_then(|s| Utc.timestamp_opt(s, 0).single())
        .unwrap_or_else(|| now + ChronoDuration::seconds(DEFAULT_RATE_LIMIT_WAIT_SECS))
}
