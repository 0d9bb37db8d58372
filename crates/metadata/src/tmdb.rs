//! TMDB (The Movie Database) provider client.
//!
//! Uses TMDB API v3: https://developer.themoviedb.org/docs
//!
//! The API key and language are looked up in settings on every request, so
//! edits take effect on the next load.

use std::sync::Arc;
use std::time::Duration;

use ratingsline_core::MediaRef;
use ratingsline_db::SettingsSource;
use tracing::debug;

use crate::provider::MetadataProvider;
use crate::transport::{Transport, TransportError};
use crate::{MetadataError, MetadataRecord};

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

pub const API_KEY_SETTING: &str = "tmdb_api_key";
pub const LANGUAGE_SETTING: &str = "metadata_language";

/// Extra blocks needed for the content rating.
const APPEND_TO_RESPONSE: &str = "content_ratings,release_dates";

pub struct TmdbClient {
    transport: Arc<dyn Transport>,
    settings: Arc<dyn SettingsSource>,
    base_url: String,
    fallback_key: Option<String>,
    default_language: String,
    timeout: Duration,
}

impl TmdbClient {
    pub fn new(transport: Arc<dyn Transport>, settings: Arc<dyn SettingsSource>) -> Self {
        Self {
            transport,
            settings,
            base_url: DEFAULT_BASE_URL.to_string(),
            fallback_key: None,
            default_language: "en".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Key used when settings have none (e.g. from the environment).
    pub fn with_fallback_key(mut self, key: Option<String>) -> Self {
        self.fallback_key = key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        self
    }

    /// Language used when settings have none.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Settings first, then the fallback key.
    pub async fn api_key(&self) -> Option<String> {
        match self.settings.get_nonempty(API_KEY_SETTING).await {
            Some(key) => Some(key),
            None => self.fallback_key.clone(),
        }
    }

    pub async fn language(&self) -> String {
        self.settings
            .get_nonempty(LANGUAGE_SETTING)
            .await
            .unwrap_or_else(|| self.default_language.clone())
    }

    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, MetadataError> {
        let api_key = self.api_key().await.ok_or(MetadataError::MissingApiKey)?;

        let mut all_params = vec![("api_key", api_key.as_str())];
        all_params.extend_from_slice(params);

        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "TMDB request");

        self.transport
            .get_json(&url, &all_params, self.timeout)
            .await
            .map_err(|e| match e {
                TransportError::Status(404) => MetadataError::NotFound,
                TransportError::Status(code) => {
                    MetadataError::Provider(format!("TMDB returned {code}"))
                }
                TransportError::Decode(msg) => MetadataError::Provider(format!("parse JSON: {msg}")),
                other => MetadataError::Network(other.to_string()),
            })
    }
}

#[async_trait::async_trait]
impl MetadataProvider for TmdbClient {
    fn name(&self) -> &str {
        "tmdb"
    }

    async fn request_key(&self, media: &MediaRef) -> String {
        format!(
            "{}/{}?language={}",
            media.media_type.tmdb_segment(),
            media.id,
            self.language().await
        )
    }

    async fn get_details(&self, media: &MediaRef) -> Result<MetadataRecord, MetadataError> {
        let language = self.language().await;
        let data = self
            .get_json(
                &format!("/{}/{}", media.media_type.tmdb_segment(), media.id),
                &[
                    ("append_to_response", APPEND_TO_RESPONSE),
                    ("language", language.as_str()),
                ],
            )
            .await?;

        if !data.is_object() {
            return Err(MetadataError::Provider("unexpected response shape".into()));
        }

        Ok(MetadataRecord::new(media.media_type, data))
    }
}
