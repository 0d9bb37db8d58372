//! MDBList ratings client.
//!
//! Every outcome resolves to a [`RatingsResult`]; failures are carried in its
//! `error` field. Results are cached per title except for failures the user
//! can fix (missing or rejected API key).

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use ratingsline_core::{FetchError, MediaRef, RatingsResult};
use ratingsline_db::SettingsSource;
use tracing::{debug, warn};

use crate::transport::{Transport, TransportError};
use crate::ttl_cache::TtlCache;

/// Settings key of the user's MDBList API key.
pub const API_KEY_SETTING: &str = "mdblist_api_key";

pub const DEFAULT_API_URL: &str = "https://api.mdblist.com/tmdb/";

type Flight = Shared<BoxFuture<'static, RatingsResult>>;

#[derive(Clone)]
pub struct RatingsClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    cache: TtlCache<RatingsResult>,
    settings: Arc<dyn SettingsSource>,
    api_url: String,
    timeout: Duration,
    in_flight: Mutex<HashMap<String, (u64, Flight)>>,
    next_flight: AtomicU64,
}

impl RatingsClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: TtlCache<RatingsResult>,
        settings: Arc<dyn SettingsSource>,
    ) -> Self {
        Self::with_endpoint(transport, cache, settings, DEFAULT_API_URL, Duration::from_secs(10))
    }

    pub fn with_endpoint(
        transport: Arc<dyn Transport>,
        cache: TtlCache<RatingsResult>,
        settings: Arc<dyn SettingsSource>,
        api_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let mut api_url = api_url.into();
        if !api_url.ends_with('/') {
            api_url.push('/');
        }
        Self {
            inner: Arc::new(Inner {
                transport,
                cache,
                settings,
                api_url,
                timeout,
                in_flight: Mutex::new(HashMap::new()),
                next_flight: AtomicU64::new(0),
            }),
        }
    }

    /// Ratings for one title. Never fails; see the module docs.
    ///
    /// Concurrent calls for the same id share a single request.
    pub async fn fetch_ratings(&self, media: &MediaRef) -> RatingsResult {
        if media.id.trim().is_empty() {
            warn!("ratings requested without a media id");
            return RatingsResult::from_error(&FetchError::InvalidInput);
        }

        if let Some(cached) = self.inner.cache.get(&media.id).await {
            debug!(media_id = %media.id, "ratings served from cache");
            return cached;
        }

        let Some(api_key) = self.inner.settings.get_nonempty(API_KEY_SETTING).await else {
            debug!(media_id = %media.id, "ratings API key not configured");
            return RatingsResult::from_error(&FetchError::ApiKeyMissing);
        };

        self.join_or_start(media, api_key).await
    }

    /// Join the running request for `media`, or spawn one.
    ///
    /// The request runs as its own task, so it completes and leaves the
    /// in-flight map even when every caller stops waiting for it.
    fn join_or_start(&self, media: &MediaRef, api_key: String) -> Flight {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some((_, flight)) = in_flight.get(&media.id) {
            debug!(media_id = %media.id, "joining in-flight ratings request");
            return flight.clone();
        }

        let token = self.inner.next_flight.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.clone();
        let owned = media.clone();
        let task = tokio::spawn(async move {
            let result = inner.fetch_remote(&owned, &api_key).await;
            inner.finish_flight(&owned.id, token);
            result
        });

        let media_id = media.id.clone();
        let flight = async move {
            task.await.unwrap_or_else(|e| {
                warn!(media_id = %media_id, error = %e, "ratings task did not complete");
                RatingsResult::from_error(&FetchError::transport("network"))
            })
        }
        .boxed()
        .shared();
        in_flight.insert(media.id.clone(), (token, flight.clone()));
        flight
    }
}

impl Inner {
    fn finish_flight(&self, media_id: &str, token: u64) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.get(media_id).is_some_and(|(t, _)| *t == token) {
            in_flight.remove(media_id);
        }
    }

    async fn fetch_remote(&self, media: &MediaRef, api_key: &str) -> RatingsResult {
        let url = format!("{}{}/{}", self.api_url, media.media_type.as_str(), media.id);

        let outcome = match self
            .transport
            .get_json(&url, &[("apikey", api_key)], self.timeout)
            .await
        {
            Ok(body) => parse_ratings_body(&body),
            Err(TransportError::Decode(e)) => {
                warn!(media_id = %media.id, error = %e, "undecodable ratings response");
                Err(FetchError::Format)
            }
            Err(e) => Err(FetchError::transport(e.status_text())),
        };

        match outcome {
            Ok(scores) => {
                let result = RatingsResult {
                    scores,
                    error: None,
                };
                self.cache.set(&media.id, &result).await;
                result
            }
            Err(err) => {
                warn!(media_id = %media.id, error = %err, "ratings fetch failed");
                let result = RatingsResult::from_error(&err);
                if err.is_cacheable() {
                    self.cache.set(&media.id, &result).await;
                } else {
                    debug!(media_id = %media.id, "not caching auth failure");
                }
                result
            }
        }
    }
}

/// Flatten the provider's `ratings` array into per-source scores.
///
/// Entries with a null (or non-numeric) value are left out entirely. Without
/// the array only a non-empty `error` string is a provider error; any other
/// shape is a format error.
fn parse_ratings_body(body: &serde_json::Value) -> Result<BTreeMap<String, f64>, FetchError> {
    if let Some(ratings) = body["ratings"].as_array() {
        let scores = ratings
            .iter()
            .filter_map(|r| {
                let source = r["source"].as_str().filter(|s| !s.is_empty())?;
                let value = match &r["value"] {
                    serde_json::Value::Number(n) => n.as_f64(),
                    serde_json::Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                }?;
                Some((source.to_string(), value))
            })
            .collect();
        return Ok(scores);
    }

    match body["error"].as_str().filter(|m| !m.is_empty()) {
        Some(message) => Err(FetchError::Provider(message.to_string())),
        None => Err(FetchError::Format),
    }
}
