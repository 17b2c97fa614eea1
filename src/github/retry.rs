use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use super::ClientError;

pub const MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Slept on top of the advertised rate-limit reset.
    pub rate_limit_buffer: Duration,
}

impl RetryPolicy {
    pub fn new(rate_limit_buffer: Duration) -> Self {
        Self {
            attempts: MAX_ATTEMPTS,
            rate_limit_buffer,
        }
    }

    pub fn rate_limit_wait(&self, reset: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        (reset - now).to_std().unwrap_or(Duration::ZERO) + self.rate_limit_buffer
    }
}

/// Run `op` until it succeeds or the attempt ceiling is hit, sleeping through
/// rate-limit windows in between. Returns the last error on exhaustion.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        warn!("Attempt {}/{} for {} failed: {}", attempt, attempts, what, err);
        if attempt >= attempts {
            return Err(err);
        }

        if let ClientError::RateLimited { reset } = err {
            let wait = policy.rate_limit_wait(reset, Utc::now());
            info!(
                "Rate limit exceeded. Sleeping until rate limit reset at {} ({}s)",
                reset,
                wait.as_secs()
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::cell::Cell;

    fn instant() -> RetryPolicy {
        RetryPolicy::new(Duration::ZERO)
    }

    fn server_error() -> ClientError {
        ClientError::Api {
            status: 502,
            message: "bad gateway".to_string(),
        }
    }

    #[tokio::test]
    async fn test_returns_first_success() {
        let calls = Cell::new(0);
        let result = retry_with_backoff(&instant(), "op", || {
            calls.set(calls.get() + 1);
            async { Ok::<_, ClientError>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = Cell::new(0);
        let result = retry_with_backoff(&instant(), "op", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(server_error())
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_ceiling() {
        let calls = Cell::new(0);
        let result: Result<(), _> = retry_with_backoff(&instant(), "op", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                Err(ClientError::Api {
                    status: 500,
                    message: format!("failure {}", n),
                })
            }
        })
        .await;

        assert_eq!(calls.get(), MAX_ATTEMPTS);
        match result {
            Err(ClientError::Api { message, .. }) => assert_eq!(message, "failure 5"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_in_the_past_retries_immediately() {
        let calls = Cell::new(0);
        let result = retry_with_backoff(&instant(), "op", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n == 1 {
                    Err(ClientError::RateLimited {
                        reset: Utc::now() - chrono::Duration::seconds(5),
                    })
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_sleeps_until_reset_plus_buffer() {
        let policy = RetryPolicy::new(Duration::from_secs(10));
        let calls = Cell::new(0);
        let started = tokio::time::Instant::now();
        let result = retry_with_backoff(&policy, "op", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n == 1 {
                    Err(ClientError::RateLimited {
                        reset: Utc::now() + chrono::Duration::seconds(60),
                    })
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(69), "waited {:?}", waited);
        assert!(waited <= Duration::from_secs(70), "waited {:?}", waited);
    }

    #[test]
    fn test_rate_limit_wait_adds_buffer() {
        let policy = RetryPolicy::new(Duration::from_secs(30));
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap();

        let reset = now + chrono::Duration::seconds(90);
        assert_eq!(policy.rate_limit_wait(reset, now), Duration::from_secs(120));

        let already_reset = now - chrono::Duration::seconds(90);
        assert_eq!(
            policy.rate_limit_wait(already_reset, now),
            Duration::from_secs(30)
        );
    }
}
