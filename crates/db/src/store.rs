//! Durable key/blob storage used by the ratings cache.
//!
//! Blobs are opaque to callers. When a blob is a JSON object of
//! `{ "timestamp": .., "data": .. }` entries, `read` enforces the advisory
//! entry limit by dropping the oldest entries first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use sqlx::SqlitePool;
use tracing::debug;

use crate::StoreError;

#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the blob under `key`, trimming it to at most `limit` entries.
    async fn read(&self, key: &str, limit: usize) -> Result<Option<String>, StoreError>;

    /// Replace the blob under `key`.
    async fn write(&self, key: &str, blob: &str) -> Result<(), StoreError>;
}

/// Blob store backed by the `blob_store` table.
#[derive(Clone)]
pub struct SqliteBlobStore {
    pool: SqlitePool,
}

impl SqliteBlobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BlobStore for SqliteBlobStore {
    async fn read(&self, key: &str, limit: usize) -> Result<Option<String>, StoreError> {
        let Some(blob) = crate::repo::blobs::get(&self.pool, key).await? else {
            return Ok(None);
        };
        match trim_to_limit(&blob, limit) {
            Some(trimmed) => {
                crate::repo::blobs::put(&self.pool, key, &trimmed).await?;
                Ok(Some(trimmed))
            }
            None => Ok(Some(blob)),
        }
    }

    async fn write(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        crate::repo::blobs::put(&self.pool, key, blob).await?;
        Ok(())
    }
}

/// In-process blob store. Can be switched off to simulate an unavailable backend.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw blob as currently stored, bypassing the limit.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert_raw(&self, key: &str, blob: &str) {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), blob.to_string());
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read(&self, key: &str, limit: usize) -> Result<Option<String>, StoreError> {
        self.check_available()?;
        let mut blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(blob) = blobs.get(key).cloned() else {
            return Ok(None);
        };
        match trim_to_limit(&blob, limit) {
            Some(trimmed) => {
                blobs.insert(key.to_string(), trimmed.clone());
                Ok(Some(trimmed))
            }
            None => Ok(Some(blob)),
        }
    }

    async fn write(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        self.check_available()?;
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), blob.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Returns the trimmed blob, or `None` when it is within the limit or not an entry map.
fn trim_to_limit(blob: &str, limit: usize) -> Option<String> {
    let serde_json::Value::Object(mut entries) = serde_json::from_str::<serde_json::Value>(blob).ok()? else {
        return None;
    };
    if entries.len() <= limit {
        return None;
    }

    let mut by_age: Vec<(i64, String)> = entries
        .iter()
        .map(|(k, v)| (v["timestamp"].as_i64().unwrap_or(i64::MIN), k.clone()))
        .collect();
    by_age.sort();

    let excess = entries.len() - limit;
    for (_, key) in by_age.into_iter().take(excess) {
        entries.remove(&key);
    }
    debug!(dropped = excess, limit, "trimmed blob to entry limit");

    serde_json::to_string(&entries).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn three_entries() -> String {
        json!({
            "a": { "timestamp": 300, "data": 1 },
            "b": { "timestamp": 100, "data": 2 },
            "c": { "timestamp": 200, "data": 3 }
        })
        .to_string()
    }

    #[test]
    fn trim_drops_oldest_entries() {
        let trimmed = trim_to_limit(&three_entries(), 2).unwrap();
        let value: serde_json::Value = serde_json::from_str(&trimmed).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert!(obj.contains_key("a"));
        assert!(obj.contains_key("c"));
        assert!(!obj.contains_key("b"));
    }

    #[test]
    fn trim_leaves_small_or_opaque_blobs_alone() {
        assert!(trim_to_limit(&three_entries(), 3).is_none());
        assert!(trim_to_limit("not json", 0).is_none());
        assert!(trim_to_limit("[1,2,3]", 1).is_none());
    }

    #[tokio::test]
    async fn memory_store_fails_when_unavailable() {
        let store = MemoryBlobStore::new();
        store.write("k", "{}").await.unwrap();
        store.set_available(false);

        assert!(matches!(store.read("k", 10).await, Err(StoreError::Unavailable)));
        assert!(matches!(store.write("k", "{}").await, Err(StoreError::Unavailable)));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn sqlite_store_persists_trimmed_blob() {
        let pool = crate::connect(":memory:").await.unwrap();
        crate::migrate::run(&pool).await.unwrap();
        let store = SqliteBlobStore::new(pool.clone());

        store.write("cache", &three_entries()).await.unwrap();
        let read = store.read("cache", 1).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&read).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 1);
        assert_eq!(value["a"]["data"], 1);

        let stored = crate::repo::blobs::get(&pool, "cache").await.unwrap().unwrap();
        assert_eq!(stored, read);
    }
}
