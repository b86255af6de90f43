/// Bounded retry with exponential backoff for upstream HTTP calls.
///
/// Only transient failures are retried: timeouts, connection errors, HTTP 429
/// and 5xx. Malformed bodies and client errors fail immediately.
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::StatusCode;
use tracing::warn;

use crate::http::{env_u64, UpstreamError};

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Read `{prefix}_MAX_RETRIES`, `{prefix}_RETRY_INITIAL_MS` and `{prefix}_RETRY_MAX_MS`.
    pub fn from_env(prefix: &str) -> Self {
        let max_retries = env_u64(&format!("{prefix}_MAX_RETRIES"), 3) as u32;
        let initial_backoff =
            Duration::from_millis(env_u64(&format!("{prefix}_RETRY_INITIAL_MS"), 200));
        let max_backoff = Duration::from_millis(env_u64(&format!("{prefix}_RETRY_MAX_MS"), 5_000));
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }

    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    pub async fn run<T, Fut, F>(&self, service: &'static str, mut f: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt > self.max_retries || !should_retry(&e) {
                        return Err(e);
                    }
                    let delay = backoff_delay(self.initial_backoff, self.max_backoff, attempt - 1);
                    warn!(
                        service,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "upstream request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

pub fn should_retry(err: &UpstreamError) -> bool {
    match err {
        UpstreamError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        UpstreamError::Upstream { status, .. } | UpstreamError::UpstreamBody { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        UpstreamError::InvalidJson(_) | UpstreamError::MissingField(_) => false,
    }
}

fn backoff_delay(initial: Duration, max: Duration, exponent: u32) -> Duration {
    let mult = 1u128.checked_shl(exponent).unwrap_or(u128::MAX);
    let base_ms = initial.as_millis().saturating_mul(mult);
    let capped_ms = std::cmp::min(base_ms, max.as_millis()) as u64;
    let jitter_cap = std::cmp::max(1, capped_ms / 4);
    Duration::from_millis(capped_ms.saturating_add(pseudo_jitter_ms(jitter_cap)))
}

fn pseudo_jitter_ms(max_inclusive: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    (now.subsec_nanos() as u64) % (max_inclusive + 1)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn server_error() -> UpstreamError {
        UpstreamError::Upstream {
            status: StatusCode::BAD_GATEWAY,
            message: "bad gateway".to_string(),
        }
    }

    #[test]
    fn backoff_is_capped_with_bounded_jitter() {
        let initial = Duration::from_millis(200);
        let max = Duration::from_millis(1_000);
        let first = backoff_delay(initial, max, 0);
        assert!(first >= initial && first <= Duration::from_millis(250));
        let late = backoff_delay(initial, max, 40);
        assert!(late >= max && late <= Duration::from_millis(1_250));
    }

    #[test]
    fn only_transient_statuses_retry() {
        assert!(should_retry(&server_error()));
        assert!(should_retry(&UpstreamError::UpstreamBody {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: String::new(),
        }));
        assert!(!should_retry(&UpstreamError::Upstream {
            status: StatusCode::UNAUTHORIZED,
            message: "bad key".to_string(),
        }));
        assert!(!should_retry(&UpstreamError::MissingField("choices")));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        };
        let result = policy
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(server_error())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 1,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        };
        let result: Result<(), _> = policy
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(server_error()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
