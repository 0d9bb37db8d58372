//! Per-panel orchestration of the ratings and details fetches.
//!
//! Every `update` starts a new epoch. Work dispatched for an older epoch may
//! still finish, but its result is dropped when it settles: a fast answer for
//! an old focus never replaces the newer title, and a slow one arriving after
//! the newer title was drawn is ignored. Destroying the panel makes every
//! epoch stale.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use ratingsline_core::{FocusItem, PipelineConfig, Provider, RatingsResult};
use ratingsline_db::SettingsSource;
use ratingsline_metadata::{MetadataLoader, MetadataRecord, RatingsClient};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::REGION_SETTING;
use crate::render::{Visibility, compose_details};
use crate::target::RenderTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Updating,
    RatingsPending,
    MetadataPending,
    Rendered,
    Destroyed,
}

/// Token captured when work is dispatched and checked when it settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Epoch {
    lifecycle: u64,
    generation: u64,
}

#[derive(Debug)]
struct PanelState {
    lifecycle: u64,
    generation: u64,
    destroyed: bool,
    phase: Phase,
    current_ratings: HashMap<String, RatingsResult>,
    /// Id of each unsettled ratings fetch, with the generation that started it.
    pending_ratings: HashMap<String, u64>,
}

impl PanelState {
    fn new() -> Self {
        Self {
            lifecycle: 0,
            generation: 0,
            destroyed: false,
            phase: Phase::Idle,
            current_ratings: HashMap::new(),
            pending_ratings: HashMap::new(),
        }
    }

    fn epoch(&self) -> Epoch {
        Epoch {
            lifecycle: self.lifecycle,
            generation: self.generation,
        }
    }

    fn is_current(&self, epoch: Epoch) -> bool {
        !self.destroyed && self.epoch() == epoch
    }

    fn mark_pending(&mut self, id: &str, generation: u64) {
        self.pending_ratings.insert(id.to_string(), generation);
    }

    /// Clears the marker only if no later generation re-marked `id`.
    fn settle_pending(&mut self, id: &str, generation: u64) {
        if self.pending_ratings.get(id) == Some(&generation) {
            self.pending_ratings.remove(id);
        }
    }
}

/// One detail panel. Cheap to clone; clones drive the same panel.
#[derive(Clone)]
pub struct PanelController {
    inner: Arc<PanelInner>,
}

struct PanelInner {
    panel_id: Uuid,
    config: PipelineConfig,
    ratings: RatingsClient,
    loader: MetadataLoader,
    settings: Arc<dyn SettingsSource>,
    target: Arc<dyn RenderTarget>,
    state: Mutex<PanelState>,
    /// Serialises "check epoch, then arm the loader" across update tasks, so
    /// a stale task can never re-arm the loader over a newer one.
    load_gate: tokio::sync::Mutex<()>,
}

impl PanelController {
    pub fn new(
        config: PipelineConfig,
        ratings: RatingsClient,
        loader: MetadataLoader,
        settings: Arc<dyn SettingsSource>,
        target: Arc<dyn RenderTarget>,
    ) -> Self {
        Self {
            inner: Arc::new(PanelInner {
                panel_id: Uuid::new_v4(),
                config,
                ratings,
                loader,
                settings,
                target,
                state: Mutex::new(PanelState::new()),
                load_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn panel_id(&self) -> Uuid {
        self.inner.panel_id
    }

    /// Attach the rendering surface and start from a clean slate.
    pub fn create(&self) {
        {
            let mut state = self.inner.lock_state();
            let lifecycle = state.lifecycle + 1;
            *state = PanelState::new();
            state.lifecycle = lifecycle;
        }
        self.inner.loader.cancel();
        self.inner.loader.clear();
        self.inner.target.attach();
        info!(panel_id = %self.inner.panel_id, "panel created");
    }

    /// Show `item`. Returns immediately; fetches settle in the background.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn update(&self, item: FocusItem) {
        let epoch = {
            let mut state = self.inner.lock_state();
            if state.destroyed {
                debug!(panel_id = %self.inner.panel_id, "update on destroyed panel ignored");
                return;
            }
            state.generation += 1;
            state.phase = Phase::Updating;
            state.epoch()
        };

        debug!(
            panel_id = %self.inner.panel_id,
            generation = epoch.generation,
            item_id = item.id.as_deref().unwrap_or(""),
            "focus changed"
        );

        self.inner
            .target
            .show_placeholder(item.display_title(), item.description());
        let background = item
            .backdrop_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| self.inner.config.backdrop_url(p));
        self.inner.target.show_background(background.as_deref());

        let inner = self.inner.clone();
        tokio::spawn(async move { inner.run_update(epoch, item).await });
    }

    /// Release the surface. Nothing dispatched earlier will touch it again.
    pub fn destroy(&self) {
        {
            let mut state = self.inner.lock_state();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.lifecycle += 1;
            state.phase = Phase::Destroyed;
            state.current_ratings.clear();
            state.pending_ratings.clear();
        }
        self.inner.loader.cancel();
        self.inner.loader.clear();
        self.inner.target.detach();
        info!(panel_id = %self.inner.panel_id, "panel destroyed");
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock_state().phase
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock_state().generation
    }

    /// Whether a ratings fetch for `id` has been dispatched and not settled.
    pub fn is_pending(&self, id: &str) -> bool {
        self.inner.lock_state().pending_ratings.contains_key(id)
    }

    pub fn ratings_for(&self, id: &str) -> Option<RatingsResult> {
        self.inner.lock_state().current_ratings.get(id).cloned()
    }
}

impl PanelInner {
    fn lock_state(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_update(self: Arc<Self>, epoch: Epoch, item: FocusItem) {
        let ratings_id = match item.media_ref() {
            Some(media) => {
                {
                    let mut state = self.lock_state();
                    if state.is_current(epoch) {
                        state.mark_pending(&media.id, epoch.generation);
                        state.phase = Phase::RatingsPending;
                    }
                }

                let result = self.ratings.fetch_ratings(&media).await;

                let mut state = self.lock_state();
                state.settle_pending(&media.id, epoch.generation);
                if !state.is_current(epoch) {
                    debug!(
                        panel_id = %self.panel_id,
                        media_id = %media.id,
                        "stale ratings result dropped"
                    );
                    return;
                }
                if let Some(error) = &result.error {
                    debug!(panel_id = %self.panel_id, media_id = %media.id, error = %error, "ratings unavailable");
                }
                state.current_ratings.insert(media.id.clone(), result);
                Some(media.id)
            }
            None => None,
        };

        let Some(details) = item.metadata_ref() else {
            debug!(panel_id = %self.panel_id, "focused item has no id; nothing to load");
            return;
        };

        let _gate = self.load_gate.lock().await;
        {
            let mut state = self.lock_state();
            if !state.is_current(epoch) {
                return;
            }
            state.phase = Phase::MetadataPending;
        }

        let panel = Arc::downgrade(&self);
        self.loader
            .load(&details, move |record| draw_if_current(panel, epoch, ratings_id, record))
            .await;
    }

    async fn visibility(&self) -> Visibility {
        let mut visible = Vec::new();
        for provider in Provider::DISPLAY_ORDER {
            if self
                .settings
                .get_bool(provider.setting_key(), provider.default_visible())
                .await
            {
                visible.push(provider);
            }
        }
        Visibility::only(&visible)
    }

    async fn render(&self, epoch: Epoch, ratings_id: Option<String>, record: MetadataRecord) {
        let visibility = self.visibility().await;
        let region = self
            .settings
            .get_nonempty(REGION_SETTING)
            .await
            .unwrap_or_else(|| self.config.region.clone());

        // Held across the draw so a concurrent destroy cannot interleave.
        let mut state = self.lock_state();
        if !state.is_current(epoch) {
            debug!(panel_id = %self.panel_id, "stale details dropped");
            return;
        }

        let ratings = ratings_id
            .as_deref()
            .and_then(|id| state.current_ratings.get(id));
        let view = compose_details(&record, ratings, &visibility, &region);
        self.target.draw(&view);
        state.phase = Phase::Rendered;
        debug!(
            panel_id = %self.panel_id,
            generation = epoch.generation,
            badges = view.badges.len(),
            "details drawn"
        );
    }
}

async fn draw_if_current(
    panel: Weak<PanelInner>,
    epoch: Epoch,
    ratings_id: Option<String>,
    record: MetadataRecord,
) {
    if let Some(panel) = panel.upgrade() {
        panel.render(epoch, ratings_id, record).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ratingsline_core::{MediaRef, MediaType};
    use ratingsline_db::MemorySettings;
    use ratingsline_metadata::MetadataError;
    use ratingsline_metadata::provider::MetadataProvider;

    use super::*;
    use crate::target::{RecordingTarget, RenderEvent};

    struct InstantDetails;

    #[async_trait::async_trait]
    impl MetadataProvider for InstantDetails {
        fn name(&self) -> &str {
            "instant"
        }

        async fn request_key(&self, media: &MediaRef) -> String {
            format!("{}/{}", media.media_type.tmdb_segment(), media.id)
        }

        async fn get_details(&self, media: &MediaRef) -> Result<MetadataRecord, MetadataError> {
            Ok(MetadataRecord::new(
                media.media_type,
                serde_json::json!({ "id": media.id, "release_date": "1999-10-15" }),
            ))
        }
    }

    fn panel() -> (PanelController, Arc<RecordingTarget>) {
        let settings = Arc::new(MemorySettings::new());
        let transport = Arc::new(ratingsline_metadata::transport::ReqwestTransport::new());
        let cache = ratingsline_metadata::TtlCache::new(
            Arc::new(ratingsline_db::MemoryBlobStore::new()),
            Arc::new(ratingsline_metadata::clock::ManualClock::new(0)),
            "ratings",
            Duration::from_secs(60),
            10,
        );
        let ratings = RatingsClient::new(transport, cache, settings.clone());
        let loader = MetadataLoader::new(Arc::new(InstantDetails), Duration::from_millis(300));
        let target = Arc::new(RecordingTarget::new());
        let controller = PanelController::new(
            PipelineConfig::default(),
            ratings,
            loader,
            settings,
            target.clone(),
        );
        (controller, target)
    }

    fn item(id: &str) -> FocusItem {
        FocusItem {
            id: Some(id.into()),
            method: Some("movie".into()),
            title: Some(format!("Movie {id}")),
            backdrop_path: Some("/bg.jpg".into()),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn placeholder_carries_overview() {
        let (controller, target) = panel();
        controller.create();
        controller.update(FocusItem {
            overview: Some("An insomniac office worker.".into()),
            ..item("550")
        });

        assert_eq!(
            target.events()[1],
            RenderEvent::Placeholder {
                title: "Movie 550".into(),
                description: "An insomniac office worker.".into(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn update_writes_placeholder_and_background_synchronously() {
        let (controller, target) = panel();
        controller.create();
        controller.update(item("550"));

        assert_eq!(
            target.events(),
            vec![
                RenderEvent::Attached,
                RenderEvent::Placeholder {
                    title: "Movie 550".into(),
                    description: "No description".into(),
                },
                RenderEvent::Background(Some("https://image.tmdb.org/t/p/w200/bg.jpg".into())),
            ]
        );
        assert_eq!(controller.generation(), 1);
        assert_eq!(controller.phase(), Phase::Updating);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_api_key_still_draws_details() {
        let (controller, target) = panel();
        controller.create();
        controller.update(item("550"));
        tokio::time::sleep(Duration::from_secs(1)).await;

        let drawn = target.drawn();
        assert_eq!(drawn.len(), 1);
        assert_eq!(drawn[0].head, "1999");
        assert!(drawn[0].badges.is_empty());
        assert_eq!(controller.phase(), Phase::Rendered);
        assert_eq!(
            controller.ratings_for("550").and_then(|r| r.error),
            Some("API key not configured".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn create_resets_generation() {
        let (controller, _) = panel();
        controller.create();
        controller.update(item("1"));
        controller.update(item("2"));
        assert_eq!(controller.generation(), 2);

        controller.create();
        assert_eq!(controller.generation(), 0);
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn destroy_is_terminal() {
        let (controller, target) = panel();
        controller.create();
        controller.update(item("550"));
        controller.destroy();
        controller.update(item("551"));
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(target.drawn().is_empty());
        assert_eq!(target.events().last(), Some(&RenderEvent::Detached));
        assert_eq!(target.last_placeholder().as_deref(), Some("Movie 550"));
        assert_eq!(controller.phase(), Phase::Destroyed);
    }

    #[test]
    fn stale_settle_keeps_newer_pending_marker() {
        let mut state = PanelState::new();
        state.mark_pending("550", 1);
        state.mark_pending("550", 2);

        state.settle_pending("550", 1);
        assert!(state.pending_ratings.contains_key("550"));

        state.settle_pending("550", 2);
        assert!(state.pending_ratings.is_empty());
    }

    #[test]
    fn epochs_compare_lifecycle_and_generation() {
        let mut state = PanelState::new();
        let first = state.epoch();
        assert!(state.is_current(first));

        state.generation += 1;
        assert!(!state.is_current(first));

        let second = state.epoch();
        state.destroyed = true;
        assert!(!state.is_current(second));
    }
}
