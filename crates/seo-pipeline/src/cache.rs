/// Redis caching for the two data-source fetches.
///
/// Audits and search results are expensive (Lighthouse runs take tens of
/// seconds, searches cost API credits) and stable for a while, so they are
/// cached with a TTL. Language-model output is never cached. All lookups
/// degrade to a miss when Redis is unavailable.
///
/// Key schema:
/// - `seo:v1:audit:{sha256(url)}`: audit JSON
/// - `seo:v1:search:{sha256(query|location)}`: JSON-serialized Vec<SearchResult>
use seo_common::redis::RedisCache;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::model::SearchResult;

const KEY_PREFIX: &str = "seo:v1:";
pub const DEFAULT_TTL_SECS: u64 = 3600;

pub struct DataSourceCache {
    redis: RedisCache,
    ttl_secs: u64,
}

impl DataSourceCache {
    pub fn new(redis: RedisCache, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }

    pub fn disabled() -> Self {
        Self::new(RedisCache::disabled(), DEFAULT_TTL_SECS)
    }

    pub async fn get_audit(&self, url: &str) -> Option<serde_json::Value> {
        let key = audit_key(url);
        let json = self.redis.get(&key).await?;
        serde_json::from_str(&json)
            .inspect_err(|e| warn!(error = %e, key, "cache deserialization failed"))
            .ok()
    }

    pub async fn set_audit(&self, url: &str, audit: &serde_json::Value) {
        let key = audit_key(url);
        if let Ok(json) = serde_json::to_string(audit) {
            self.redis.set_with_ttl(&key, &json, self.ttl_secs).await;
        }
    }

    pub async fn get_search_results(&self, query: &str, location: &str) -> Option<Vec<SearchResult>> {
        let key = search_key(query, location);
        let json = self.redis.get(&key).await?;
        serde_json::from_str(&json)
            .inspect_err(|e| warn!(error = %e, key, "cache deserialization failed"))
            .ok()
    }

    pub async fn set_search_results(&self, query: &str, location: &str, results: &[SearchResult]) {
        let key = search_key(query, location);
        if let Ok(json) = serde_json::to_string(results) {
            self.redis.set_with_ttl(&key, &json, self.ttl_secs).await;
        }
    }
}

fn audit_key(url: &str) -> String {
    format!("{KEY_PREFIX}audit:{}", digest(&[url]))
}

/// Query and location are compared case-insensitively; the search provider treats them so.
fn search_key(query: &str, location: &str) -> String {
    let query = query.trim().to_lowercase();
    let location = location.trim().to_lowercase();
    format!("{KEY_PREFIX}search:{}", digest(&[query.as_str(), location.as_str()]))
}

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
