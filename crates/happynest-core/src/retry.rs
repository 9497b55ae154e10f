//! Retry policies for outbound calls and SQLite writes
//!
//! Every fallible call that may succeed on a second try goes through
//! [`retry_with_backoff`]. The error decides its own [`RetryClass`] and the
//! [`RetryPolicy`] maps that class to a delay, so the policy can be tested on
//! its own without any network or database.

use std::future::Future;
use std::time::Duration;

use crate::config::NewsConfig;
use crate::Result;

/// How an error should be treated by the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Upstream asked us to slow down (HTTP 429)
    RateLimited,
    /// Upstream failed on its side (HTTP 5xx)
    ServerError,
    /// Short-lived local failure, e.g. SQLite busy
    Transient,
    /// Not worth retrying
    Fatal,
}

/// Delay table plus an attempt cap
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub rate_limited_delay: Duration,
    pub server_error_delay: Duration,
    /// First delay for transient errors, doubled on every further attempt
    pub transient_base_delay: Duration,
    /// Number of retries allowed after the first attempt
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limited_delay: Duration::from_secs(10),
            server_error_delay: Duration::from_secs(260),
            transient_base_delay: Duration::from_millis(200),
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    /// Policy for the news search API
    pub fn upstream(config: &NewsConfig) -> Self {
        Self {
            rate_limited_delay: Duration::from_secs(config.rate_limit_delay_secs),
            server_error_delay: Duration::from_secs(config.server_error_delay_secs),
            max_retries: config.max_retries,
            ..Self::default()
        }
    }

    /// Policy for SQLite writes: only transient errors are retried
    pub fn storage() -> Self {
        Self::default()
    }

    /// Delay before retry number `attempt` (1-based), or `None` to give up
    pub fn delay_for(&self, class: RetryClass, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }

        match class {
            RetryClass::RateLimited => Some(self.rate_limited_delay),
            RetryClass::ServerError => Some(self.server_error_delay),
            RetryClass::Transient => Some(
                self.transient_base_delay
                    .saturating_mul(2u32.saturating_pow(attempt - 1)),
            ),
            RetryClass::Fatal => None,
        }
    }
}

/// Run `operation` until it succeeds, hits a fatal error, or the policy gives up
pub async fn retry_with_backoff<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let class = e.retry_class();
                attempts += 1;
                match policy.delay_for(class, attempts) {
                    Some(delay) => {
                        tracing::warn!(
                            error = %e,
                            class = ?class,
                            attempt = attempts,
                            max_retries = policy.max_retries,
                            delay_ms = delay.as_millis(),
                            "Retrying after failure"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(e),
                }
            }
        }
    }
}

/// Check if a SQLite error is transient and should be retried
///
/// Covers SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_IOERR (10) and the
/// extended busy/IO codes derived from them.
pub fn is_transient_sqlite_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string());
            matches!(
                code.as_deref(),
                Some("5")     // SQLITE_BUSY
                | Some("6")   // SQLITE_LOCKED
                | Some("10")  // SQLITE_IOERR
                | Some("266") // SQLITE_IOERR_READ
                | Some("522") // SQLITE_IOERR_SHORT_READ
                | Some("1032") // SQLITE_BUSY_SNAPSHOT
                | Some("2314") // SQLITE_IOERR_WRITE
                | Some("3338") // SQLITE_IOERR_FSYNC
                | Some("5386") // SQLITE_IOERR_LOCK
            )
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::Error;

    fn upstream(status: u16) -> Error {
        Error::UpstreamStatus {
            status,
            body: "stub".to_string(),
        }
    }

    #[test]
    fn test_transient_backoff_doubles() {
        let policy = RetryPolicy::storage();
        assert_eq!(policy.delay_for(RetryClass::Transient, 1), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for(RetryClass::Transient, 2), Some(Duration::from_millis(400)));
        assert_eq!(policy.delay_for(RetryClass::Transient, 3), Some(Duration::from_millis(800)));
        assert_eq!(policy.delay_for(RetryClass::Transient, 5), Some(Duration::from_millis(3200)));
        assert_eq!(policy.delay_for(RetryClass::Transient, 6), None);
    }

    #[test]
    fn test_upstream_delays_are_fixed() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(RetryClass::RateLimited, 1), Some(Duration::from_secs(10)));
        assert_eq!(policy.delay_for(RetryClass::RateLimited, 4), Some(Duration::from_secs(10)));
        assert_eq!(policy.delay_for(RetryClass::ServerError, 2), Some(Duration::from_secs(260)));
        assert_eq!(policy.delay_for(RetryClass::Fatal, 1), None);
    }

    #[test]
    fn test_upstream_policy_reads_config() {
        let config = NewsConfig {
            rate_limit_delay_secs: 3,
            server_error_delay_secs: 30,
            max_retries: 1,
            ..NewsConfig::default()
        };
        let policy = RetryPolicy::upstream(&config);
        assert_eq!(policy.delay_for(RetryClass::RateLimited, 1), Some(Duration::from_secs(3)));
        assert_eq!(policy.delay_for(RetryClass::ServerError, 1), Some(Duration::from_secs(30)));
        assert_eq!(policy.delay_for(RetryClass::ServerError, 2), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_call_is_retried_after_cooldown() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = retry_with_backoff(&RetryPolicy::default(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(upstream(429))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_waits_long_cooldown() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = retry_with_backoff(&RetryPolicy::default(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(upstream(502))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert!(started.elapsed() >= Duration::from_secs(260));
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry_with_backoff(&RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(upstream(403)) }
        })
        .await;

        assert!(matches!(result, Err(Error::UpstreamStatus { status: 403, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 2,
            ..RetryPolicy::default()
        };

        let result: Result<()> = retry_with_backoff(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(upstream(429)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
