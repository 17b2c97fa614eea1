use reqwest::Url;
use serde::Serialize;

use crate::metrics::Window;

/// Deep links reproducing each metric as an interactive GitHub search.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricLinks {
    pub commits: String,
    pub hoc: String,
    pub issues: String,
    pub pulls: String,
    pub reviews: String,
    pub msgs: String,
}

pub struct SearchLinker<'a> {
    web_url: &'a str,
    since: String,
    organization: Option<&'a str>,
}

impl<'a> SearchLinker<'a> {
    pub fn new(web_url: &'a str, window: &Window, organization: Option<&'a str>) -> Self {
        Self {
            web_url: web_url.trim_end_matches('/'),
            since: window.since_date(),
            organization,
        }
    }

    pub fn links_for(&self, user: &str) -> MetricLinks {
        let commits = self.search_url(
            &format!("author:{} committer-date:>{}", user, self.since),
            "commits",
        );

        MetricLinks {
            hoc: commits.clone(),
            commits,
            issues: self.search_url(
                &format!("is:issue author:{} created:>{}", user, self.since),
                "issues",
            ),
            pulls: self.search_url(
                &format!("is:pr author:{} merged:>{}", user, self.since),
                "pullrequests",
            ),
            reviews: self.search_url(
                &format!("is:pr reviewed-by:{} merged:>{}", user, self.since),
                "pullrequests",
            ),
            msgs: self.search_url(
                &format!("is:pr commenter:{} created:>{}", user, self.since),
                "pullrequests",
            ),
        }
    }

    fn search_url(&self, query: &str, kind: &str) -> String {
        let query = match self.organization {
            Some(org) => format!("{} org:{}", query, org),
            None => query.to_string(),
        };
        let base = format!("{}/search", self.web_url);

        match Url::parse_with_params(&base, &[("q", query.as_str()), ("type", kind)]) {
            Ok(url) => url.to_string(),
            Err(_) => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn window() -> Window {
        Window::trailing(30, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_links_encode_queries() {
        let linker = SearchLinker::new("https://github.com/", &window(), Some("acme"));
        let links = linker.links_for("alice");

        assert_eq!(
            links.pulls,
            "https://github.com/search?q=is%3Apr+author%3Aalice+merged%3A%3E2026-01-30+org%3Aacme&type=pullrequests"
        );
        assert_eq!(links.commits, links.hoc);
        assert!(links.reviews.contains("reviewed-by%3Aalice"));
        assert!(links.msgs.contains("commenter%3Aalice"));
        assert!(links.issues.contains("is%3Aissue"));
    }

    #[test]
    fn test_links_without_organization() {
        let linker = SearchLinker::new("https://ghe.example.com", &window(), None);
        let links = linker.links_for("bob");

        assert!(links.commits.starts_with("https://ghe.example.com/search?q="));
        assert!(!links.commits.contains("org%3A"));
        assert!(links.commits.ends_with("&type=commits"));
    }
}
