use std::time::Duration;

/// Static knobs for the ratings/metadata pipeline.
///
/// Values that the user edits at runtime (API keys, provider visibility)
/// are read from the settings store instead.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base of the per-title ratings endpoint; `{movie|show}/{id}` is appended.
    pub ratings_api_url: String,
    pub ratings_timeout: Duration,
    /// Storage key of the persisted ratings blob.
    pub cache_key: String,
    pub cache_ttl: Duration,
    /// Advisory entry limit handed to the blob store.
    pub cache_limit: usize,
    pub tmdb_api_url: String,
    pub tmdb_image_url: String,
    pub metadata_timeout: Duration,
    pub debounce: Duration,
    pub language: String,
    pub region: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ratings_api_url: "https://api.mdblist.com/tmdb/".to_string(),
            ratings_timeout: Duration::from_secs(10),
            cache_key: "mdblist_ratings_cache".to_string(),
            cache_ttl: Duration::from_secs(60 * 60 * 12),
            cache_limit: 500,
            tmdb_api_url: "https://api.themoviedb.org/3".to_string(),
            tmdb_image_url: "https://image.tmdb.org/t/p".to_string(),
            metadata_timeout: Duration::from_secs(5),
            debounce: Duration::from_millis(300),
            language: "en".to_string(),
            region: "US".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Background image URL for a TMDB backdrop path.
    pub fn backdrop_url(&self, backdrop_path: &str) -> String {
        format!("{}/w200{}", self.tmdb_image_url, backdrop_path)
    }
}
