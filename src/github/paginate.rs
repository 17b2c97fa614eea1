use std::future::Future;

use super::retry::{retry_with_backoff, RetryPolicy};
use super::ClientError;

/// Page size requested from every listing and search endpoint.
pub const PER_PAGE: u32 = 100;

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor advertised by the server; `None` on the last page.
    pub next_page: Option<u32>,
}

/// A page that still failed after retries. Carries what was reduced so far.
#[derive(Debug)]
pub struct Interrupted<A> {
    pub partial: A,
    pub page: u32,
    pub source: ClientError,
}

/// Walk every page produced by `fetch`, folding each item into `init` with
/// `reduce`. Each page request goes through [`retry_with_backoff`].
pub async fn paginate<T, A, F, Fut, R>(
    policy: &RetryPolicy,
    what: &str,
    mut fetch: F,
    init: A,
    mut reduce: R,
) -> Result<A, Interrupted<A>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, ClientError>>,
    R: FnMut(A, T) -> A,
{
    let mut acc = init;
    let mut page = 1;

    loop {
        let batch = match retry_with_backoff(policy, what, || fetch(page)).await {
            Ok(batch) => batch,
            Err(source) => {
                return Err(Interrupted {
                    partial: acc,
                    page,
                    source,
                })
            }
        };

        acc = batch.items.into_iter().fold(acc, &mut reduce);

        match batch.next_page {
            Some(next) if next > page => page = next,
            _ => break,
        }
    }

    Ok(acc)
}
