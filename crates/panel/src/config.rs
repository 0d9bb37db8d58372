//! Environment overrides and settings lookups for the pipeline.

use std::time::Duration;

use ratingsline_core::PipelineConfig;
use ratingsline_db::SettingsSource;
use ratingsline_metadata::tmdb::LANGUAGE_SETTING;
use tracing::warn;

pub const REGION_SETTING: &str = "metadata_region";

/// Environment fallback for the TMDB key.
pub const TMDB_KEY_ENV: &str = "RATINGSLINE_TMDB_KEY";

/// Build the pipeline config from `RATINGSLINE_*` environment variables.
pub fn load_from_env() -> PipelineConfig {
    from_lookup(|key| std::env::var(key).ok())
}

/// Same as [`load_from_env`] with an explicit variable source.
pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PipelineConfig {
    let mut config = PipelineConfig::default();

    let string = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let number = |key: &str| -> Option<u64> {
        let raw = string(key)?;
        match raw.parse() {
            Ok(n) => Some(n),
            Err(_) => {
                warn!(key, value = %raw, "ignoring non-numeric setting");
                None
            }
        }
    };

    if let Some(url) = string("RATINGSLINE_RATINGS_URL") {
        config.ratings_api_url = url;
    }
    if let Some(ms) = number("RATINGSLINE_RATINGS_TIMEOUT_MS") {
        config.ratings_timeout = Duration::from_millis(ms);
    }
    if let Some(key) = string("RATINGSLINE_CACHE_KEY") {
        config.cache_key = key;
    }
    if let Some(secs) = number("RATINGSLINE_CACHE_TTL_SECS") {
        config.cache_ttl = Duration::from_secs(secs);
    }
    if let Some(limit) = number("RATINGSLINE_CACHE_LIMIT") {
        config.cache_limit = limit as usize;
    }
    if let Some(url) = string("RATINGSLINE_TMDB_URL") {
        config.tmdb_api_url = url;
    }
    if let Some(url) = string("RATINGSLINE_TMDB_IMAGE_URL") {
        config.tmdb_image_url = url.trim_end_matches('/').to_string();
    }
    if let Some(ms) = number("RATINGSLINE_METADATA_TIMEOUT_MS") {
        config.metadata_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = number("RATINGSLINE_DEBOUNCE_MS") {
        config.debounce = Duration::from_millis(ms);
    }
    if let Some(language) = string("RATINGSLINE_LANGUAGE") {
        config.language = language;
    }
    if let Some(region) = string("RATINGSLINE_REGION") {
        config.region = region;
    }

    config
}

/// Let stored language/region preferences win over the static defaults.
pub async fn apply_settings(config: &mut PipelineConfig, settings: &dyn SettingsSource) {
    if let Some(language) = settings.get_nonempty(LANGUAGE_SETTING).await {
        config.language = language;
    }
    if let Some(region) = settings.get_nonempty(REGION_SETTING).await {
        config.region = region;
    }
}
