use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::Window;
use crate::github::{paginate, GitHubApi, RepoId, RetryPolicy};

/// Search qualifiers locating pull requests a user took part in.
const ROLES: [(&str, &str); 3] = [
    ("author", "created pull request in"),
    ("commenter", "commented on pull request in"),
    ("reviewed-by", "reviewed pull request in"),
];

/// Repositories where `user` authored, commented on or reviewed a pull
/// request inside the window, optionally restricted to one organization.
/// Each repository appears once.
pub async fn discover_repositories<C: GitHubApi>(
    api: &C,
    retry: &RetryPolicy,
    window: &Window,
    user: &str,
    organization: Option<&str>,
) -> Vec<RepoId> {
    let mut repos = BTreeSet::new();

    for (qualifier, action) in ROLES {
        let query = format!(
            "is:pr {}:{} created:>{}",
            qualifier,
            user,
            window.since_date()
        );

        let result = paginate(
            retry,
            &query,
            |page| api.search_issues(&query, page),
            (),
            |(), issue| {
                if !issue.is_pull_request() {
                    return;
                }
                let Some(repo) = RepoId::from_api_url(&issue.repository_url) else {
                    debug!("Ignoring result without repository: #{}", issue.number);
                    return;
                };
                if organization.is_some_and(|org| !repo.belongs_to(org)) {
                    return;
                }
                debug!("User {} {} repository {}", user, action, repo);
                repos.insert(repo);
            },
        )
        .await;

        if let Err(interrupted) = result {
            warn!(
                "Error searching pull requests for user {} ({}): {}",
                user, qualifier, interrupted.source
            );
        }
    }

    info!("User {} has {} repositories", user, repos.len());
    repos.into_iter().collect()
}
