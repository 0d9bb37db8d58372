//! Debounced, per-panel metadata loading.
//!
//! A load either draws straight from the in-memory cache or (re)arms a single
//! debounce timer. Only the newest armed load reaches the provider; arming a
//! new one aborts the previous timer together with any request it started.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use ratingsline_core::MediaRef;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::MetadataRecord;
use crate::provider::MetadataProvider;

type RecordCache = Arc<Mutex<HashMap<String, MetadataRecord>>>;

pub struct MetadataLoader {
    provider: Arc<dyn MetadataProvider>,
    cache: RecordCache,
    pending: Mutex<Option<JoinHandle<()>>>,
    delay: Duration,
}

impl MetadataLoader {
    pub fn new(provider: Arc<dyn MetadataProvider>, delay: Duration) -> Self {
        Self {
            provider,
            cache: Arc::new(Mutex::new(HashMap::new())),
            pending: Mutex::new(None),
            delay,
        }
    }

    /// Load details for `media` and hand them to `draw`.
    ///
    /// On a cache hit `draw` runs before this returns. Otherwise the request
    /// is scheduled after the debounce delay and `draw` runs only if this call
    /// is not superseded first and the request succeeds.
    pub async fn load<F, Fut>(&self, media: &MediaRef, draw: F)
    where
        F: FnOnce(MetadataRecord) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let key = self.provider.request_key(media).await;
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(record) = cached {
            debug!(key = %key, "metadata served from cache");
            draw(record).await;
            return;
        }

        let provider = self.provider.clone();
        let cache = self.cache.clone();
        let delay = self.delay;
        let media = media.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match provider.get_details(&media).await {
                Ok(record) => {
                    cache
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(key, record.clone());
                    draw(record).await;
                }
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        media_id = %media.id,
                        error = %e,
                        "failed to load metadata"
                    );
                }
            }
        });

        if let Some(previous) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle)
        {
            previous.abort();
        }
    }

    /// Abort the pending timer (and its request, if already started).
    pub fn cancel(&self) {
        if let Some(handle) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }

    /// Drop every cached record.
    pub fn clear(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for MetadataLoader {
    fn drop(&mut self) {
        self.cancel();
    }
}
