use std::sync::Arc;

use ratingsline_core::PipelineConfig;
use ratingsline_db::{BlobStore, SettingsSource};
use ratingsline_metadata::clock::Clock;
use ratingsline_metadata::provider::MetadataProvider;
use ratingsline_metadata::tmdb::TmdbClient;
use ratingsline_metadata::transport::Transport;
use ratingsline_metadata::{MetadataLoader, RatingsClient, TtlCache};
use tracing::{info, warn};

use crate::config::{TMDB_KEY_ENV, apply_settings};
use crate::controller::PanelController;
use crate::target::RenderTarget;

/// Process-wide pieces shared by every panel: one ratings client (and so one
/// persisted cache) and one details provider. Each panel gets its own loader.
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    ratings: RatingsClient,
    metadata: Arc<dyn MetadataProvider>,
    settings: Arc<dyn SettingsSource>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        ratings: RatingsClient,
        metadata: Arc<dyn MetadataProvider>,
        settings: Arc<dyn SettingsSource>,
    ) -> Self {
        Self {
            config,
            ratings,
            metadata,
            settings,
        }
    }

    /// Wire the MDBList and TMDB clients over one transport.
    ///
    /// Language and region from settings override `config` defaults. The
    /// TMDB key and language are read again on every details request, with
    /// `RATINGSLINE_TMDB_KEY` as the key fallback.
    pub async fn build(
        mut config: PipelineConfig,
        store: Arc<dyn BlobStore>,
        settings: Arc<dyn SettingsSource>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        apply_settings(&mut config, settings.as_ref()).await;

        let cache = TtlCache::new(
            store,
            clock,
            config.cache_key.clone(),
            config.cache_ttl,
            config.cache_limit,
        );
        let ratings = RatingsClient::with_endpoint(
            transport.clone(),
            cache,
            settings.clone(),
            config.ratings_api_url.clone(),
            config.ratings_timeout,
        );

        let tmdb = TmdbClient::new(transport, settings.clone())
            .with_fallback_key(std::env::var(TMDB_KEY_ENV).ok())
            .with_base_url(config.tmdb_api_url.clone())
            .with_language(config.language.clone())
            .with_timeout(config.metadata_timeout);
        if tmdb.api_key().await.is_none() {
            warn!("TMDB API key not configured; details load once one is set");
        }

        info!(
            language = %config.language,
            region = %config.region,
            cache_ttl_secs = config.cache_ttl.as_secs(),
            "pipeline ready"
        );

        Self::new(config, ratings, Arc::new(tmdb), settings)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn ratings(&self) -> &RatingsClient {
        &self.ratings
    }

    /// A new panel drawing into `target`. Call `create` before use.
    pub fn panel(&self, target: Arc<dyn RenderTarget>) -> PanelController {
        let loader = MetadataLoader::new(self.metadata.clone(), self.config.debounce);
        PanelController::new(
            self.config.clone(),
            self.ratings.clone(),
            loader,
            self.settings.clone(),
            target,
        )
    }
}
