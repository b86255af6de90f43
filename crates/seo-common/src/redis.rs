/// Redis cache wrapper with graceful degradation.
///
/// All operations return `Option<T>` or `bool`. On any Redis error the operation logs
/// a warning and reports a miss, so callers fall through to the live upstream call.
/// The analyzer is fully functional without Redis.
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::warn;

pub struct RedisCache {
    client: Option<redis::Client>,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisCache {
    /// If the URL is `None` or invalid, returns a cache that always misses.
    pub fn new(url: Option<&str>) -> Self {
        let client = url.and_then(|u| {
            redis::Client::open(u)
                .inspect_err(|e| warn!(error = %e, url = u, "failed to create redis client, cache disabled"))
                .ok()
        });
        Self {
            client,
            conn: Mutex::new(None),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Test the connection by sending a PING.
    pub async fn is_available(&self) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        result.is_ok()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.connection().await?;
        let result: Result<Option<String>, _> = conn.get(key).await;
        match result {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, key, "redis GET failed");
                self.reset().await;
                None
            }
        }
    }

    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        match conn.set_ex::<_, _, ()>(key, value, ttl_secs).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, key, "redis SETEX failed");
                self.reset().await;
                false
            }
        }
    }

    /// Shared multiplexed connection, opened on first use and reopened after a failure.
    async fn connection(&self) -> Option<MultiplexedConnection> {
        let client = self.client.as_ref()?;
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Some(conn.clone());
        }
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .inspect_err(|e| warn!(error = %e, "redis connection failed"))
            .ok()?;
        *guard = Some(conn.clone());
        Some(conn)
    }

    async fn reset(&self) {
        *self.conn.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::RedisCache;

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let cache = RedisCache::disabled();
        assert!(!cache.is_available().await);
        assert_eq!(cache.get("seo:v1:anything").await, None);
        assert!(!cache.set_with_ttl("seo:v1:anything", "{}", 60).await);
    }

    #[tokio::test]
    async fn invalid_url_disables_cache() {
        let cache = RedisCache::new(Some("not a redis url"));
        assert_eq!(cache.get("key").await, None);
    }
}
