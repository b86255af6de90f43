use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Token bucket shared by every tool call. Analyses fan out into several paid
/// upstream calls, so bursts are capped at one second's worth of requests.
#[derive(Clone)]
pub struct RateLimiter {
    rps: u32,
    state: Arc<Mutex<Bucket>>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last: Instant,
}

#[derive(Debug, thiserror::Error)]
#[error("rate limit exceeded ({rps} requests/s): try again in ~{}ms", .retry_after.as_millis())]
pub struct RateLimited {
    pub rps: u32,
    pub retry_after: Duration,
}

impl RateLimiter {
    pub fn new(rps: u32) -> Self {
        let rps = rps.max(1);
        Self {
            rps,
            state: Arc::new(Mutex::new(Bucket {
                tokens: rps as f64,
                last: Instant::now(),
            })),
        }
    }

    pub async fn check(&self) -> Result<(), RateLimited> {
        let mut bucket = self.state.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last);
        bucket.last = now;

        let capacity = self.rps as f64;
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * capacity).min(capacity);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(());
        }

        Err(RateLimited {
            rps: self.rps,
            retry_after: Duration::from_secs_f64((1.0 - bucket.tokens) / capacity),
        })
    }
}
