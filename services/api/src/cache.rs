//! Two-tier result cache.
//!
//! L1 is an in-process map checked first; entries honor the shared TTL on
//! read, so a stale L1 value never outlives its L2 sibling. L2 is a remote
//! REST key-value store with per-key expiry. Every L2 failure is logged and
//! swallowed: a degraded cache must never fail the caller's request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::aggregate::AggregateResult;
use crate::error::AnalyticsError;

struct MemoryEntry {
    value: Arc<AggregateResult>,
    stored_at: Instant,
}

/// In-process cache. The key space is tiny (datasets x years), so there is
/// no eviction beyond TTL-on-read.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, MemoryEntry>>,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<AggregateResult>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub async fn insert(&self, key: &str, value: Arc<AggregateResult>) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }
}

/// REST key-value store client (Upstash-style protocol): bearer-token
/// authenticated `GET {base}/get/{key}` and `POST {base}/set/{key}?EX=ttl`.
pub struct RestKvStore {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestKvStore {
    pub fn new(http: reqwest::Client, base_url: String, token: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, AnalyticsError> {
        let url = format!("{}/get/{}", self.base_url, key);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| AnalyticsError::Cache(e.to_string()))?
            .error_for_status()
            .map_err(|e| AnalyticsError::Cache(e.to_string()))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AnalyticsError::Cache(e.to_string()))?;
        Ok(body.get("result").and_then(|v| v.as_str()).map(str::to_string))
    }

    pub async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), AnalyticsError> {
        let url = format!("{}/set/{}?EX={}", self.base_url, key, ttl_secs);
        self.http
            .post(&url)
            .bearer_auth(&self.token)
            .body(value.to_string())
            .send()
            .await
            .map_err(|e| AnalyticsError::Cache(e.to_string()))?
            .error_for_status()
            .map_err(|e| AnalyticsError::Cache(e.to_string()))?;
        Ok(())
    }
}

/// L1 + optional L2. Running without an L2 store (no credentials
/// configured) is a supported degraded mode.
pub struct TieredCache {
    l1: MemoryCache,
    l2: Option<Arc<RestKvStore>>,
    ttl: Duration,
}

impl TieredCache {
    pub fn new(l2: Option<Arc<RestKvStore>>, ttl: Duration) -> Self {
        Self {
            l1: MemoryCache::new(ttl),
            l2,
            ttl,
        }
    }

    /// L1 first, then L2; an L2 hit backfills L1. Any L2 problem degrades
    /// to a miss.
    pub async fn get(&self, key: &str) -> Option<Arc<AggregateResult>> {
        if let Some(hit) = self.l1.get(key).await {
            return Some(hit);
        }
        let store = self.l2.as_ref()?;
        match store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<AggregateResult>(&raw) {
                Ok(value) => {
                    let value = Arc::new(value);
                    self.l1.insert(key, value.clone()).await;
                    Some(value)
                }
                Err(e) => {
                    eprintln!("Warning: discarding undecodable cache entry {key}: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                eprintln!("Warning: cache read failed for {key}: {e}");
                None
            }
        }
    }

    /// Write both tiers. L2 write failures are logged and swallowed.
    pub async fn put(&self, key: &str, value: Arc<AggregateResult>) {
        self.l1.insert(key, value.clone()).await;
        let Some(store) = &self.l2 else { return };
        match serde_json::to_string(&*value) {
            Ok(raw) => {
                if let Err(e) = store.set(key, &raw, self.ttl.as_secs()).await {
                    eprintln!("Warning: cache write failed for {key}: {e}");
                }
            }
            Err(e) => eprintln!("Warning: could not encode cache entry {key}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_total(total: i64) -> Arc<AggregateResult> {
        Arc::new(AggregateResult {
            total_updates: total,
            ..AggregateResult::default()
        })
    }

    #[tokio::test]
    async fn memory_cache_round_trips() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        assert!(cache.get("k").await.is_none());
        cache.insert("k", result_with_total(7)).await;
        assert_eq!(cache.get("k").await.unwrap().total_updates, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn memory_cache_expires_after_ttl() {
        let cache = MemoryCache::new(Duration::from_secs(86_400));
        cache.insert("k", result_with_total(7)).await;

        tokio::time::advance(Duration::from_secs(86_399)).await;
        assert!(cache.get("k").await.is_some(), "still inside the TTL window");

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("k").await.is_none(), "expired entries must miss");
        // And the expired entry was dropped, not left behind.
        assert!(cache.entries.lock().await.is_empty());
    }

    #[tokio::test]
    async fn tiered_cache_without_l2_still_serves() {
        let cache = TieredCache::new(None, Duration::from_secs(60));
        assert!(cache.get("agg_v10:biometric:all").await.is_none());
        cache.put("agg_v10:biometric:all", result_with_total(170)).await;
        let hit = cache.get("agg_v10:biometric:all").await.unwrap();
        assert_eq!(hit.total_updates, 170);
    }

    #[tokio::test]
    async fn l2_failure_degrades_to_miss_not_error() {
        // Point the store at a port nothing listens on: both tiers must
        // stay silent about it.
        let store = Arc::new(RestKvStore::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1".to_string(),
            "token".to_string(),
        ));
        let cache = TieredCache::new(Some(store), Duration::from_secs(60));
        assert!(cache.get("k").await.is_none());
        cache.put("k", result_with_total(1)).await;
        // The L1 half of the write still lands.
        assert_eq!(cache.get("k").await.unwrap().total_updates, 1);
    }
}
