//! Time-boxed key/value cache persisted as a single blob.
//!
//! Expiry is lazy: an entry older than the TTL is removed when a `get`
//! finds it. Store failures degrade to cache misses and dropped writes.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use ratingsline_db::BlobStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;

type Blob = serde_json::Map<String, serde_json::Value>;

#[derive(Serialize, Deserialize)]
struct CacheEntry<T> {
    timestamp: i64,
    data: T,
}

pub struct TtlCache<T> {
    store: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    blob_key: String,
    ttl_ms: i64,
    limit: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TtlCache<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(
        store: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        blob_key: impl Into<String>,
        ttl: Duration,
        limit: usize,
    ) -> Self {
        Self {
            store,
            clock,
            blob_key: blob_key.into(),
            ttl_ms: ttl.as_millis() as i64,
            limit,
            _marker: PhantomData,
        }
    }

    /// Fresh value for `key`, if any.
    pub async fn get(&self, key: &str) -> Option<T> {
        let mut blob = self.load().await?;
        let raw = blob.get(key)?;

        let entry = match serde_json::from_value::<CacheEntry<T>>(raw.clone()) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "dropping unreadable cache entry");
                blob.remove(key);
                self.persist(&blob).await;
                return None;
            }
        };

        let age = self.clock.now_millis() - entry.timestamp;
        if age >= self.ttl_ms {
            debug!(key, age_ms = age, "cache entry expired");
            blob.remove(key);
            self.persist(&blob).await;
            return None;
        }

        debug!(key, "cache hit");
        Some(entry.data)
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub async fn set(&self, key: &str, value: &T) {
        let entry = CacheEntry {
            timestamp: self.clock.now_millis(),
            data: value,
        };
        let entry = match serde_json::to_value(&entry) {
            Ok(v) => v,
            Err(e) => {
                warn!(key, error = %e, "failed to serialize cache entry");
                return;
            }
        };

        // An unavailable store reads as empty here; the write below fails the same way.
        let mut blob = self.load().await.unwrap_or_default();
        blob.insert(key.to_string(), entry);
        self.persist(&blob).await;
    }

    /// Current blob; `None` only when the store itself failed.
    async fn load(&self) -> Option<Blob> {
        match self.store.read(&self.blob_key, self.limit).await {
            Ok(Some(raw)) => Some(match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(serde_json::Value::Object(map)) => map,
                _ => {
                    warn!(blob_key = %self.blob_key, "cache blob is corrupt, treating as empty");
                    Blob::new()
                }
            }),
            Ok(None) => Some(Blob::new()),
            Err(e) => {
                warn!(blob_key = %self.blob_key, error = %e, "cache store unavailable");
                None
            }
        }
    }

    async fn persist(&self, blob: &Blob) {
        let raw = match serde_json::to_string(blob) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(blob_key = %self.blob_key, error = %e, "failed to serialize cache blob");
                return;
            }
        };
        if let Err(e) = self.store.write(&self.blob_key, &raw).await {
            warn!(blob_key = %self.blob_key, error = %e, "failed to persist cache blob");
        }
    }
}
