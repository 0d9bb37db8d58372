use std::sync::{Mutex, PoisonError};

use tracing::info;

use crate::render::DetailsView;

/// Write-only sink the host UI exposes to a panel.
///
/// Calls are made synchronously and must not block.
pub trait RenderTarget: Send + Sync {
    fn attach(&self);

    /// Clear rating/detail fields and show `title` and `description` until
    /// details arrive.
    fn show_placeholder(&self, title: &str, description: &str);

    fn show_background(&self, url: Option<&str>);

    fn draw(&self, view: &DetailsView);

    fn detach(&self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Attached,
    Placeholder { title: String, description: String },
    Background(Option<String>),
    Drawn(DetailsView),
    Detached,
}

/// Keeps every call in order; used by tests and dry runs.
#[derive(Default)]
pub struct RecordingTarget {
    events: Mutex<Vec<RenderEvent>>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RenderEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn drawn(&self) -> Vec<DetailsView> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RenderEvent::Drawn(view) => Some(view),
                _ => None,
            })
            .collect()
    }

    pub fn last_placeholder(&self) -> Option<String> {
        self.events().into_iter().rev().find_map(|e| match e {
            RenderEvent::Placeholder { title, .. } => Some(title),
            _ => None,
        })
    }

    fn push(&self, event: RenderEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl RenderTarget for RecordingTarget {
    fn attach(&self) {
        self.push(RenderEvent::Attached);
    }

    fn show_placeholder(&self, title: &str, description: &str) {
        self.push(RenderEvent::Placeholder {
            title: title.to_string(),
            description: description.to_string(),
        });
    }

    fn show_background(&self, url: Option<&str>) {
        self.push(RenderEvent::Background(url.map(str::to_string)));
    }

    fn draw(&self, view: &DetailsView) {
        self.push(RenderEvent::Drawn(view.clone()));
    }

    fn detach(&self) {
        self.push(RenderEvent::Detached);
    }
}

/// Emits the panel contents as log lines.
pub struct LogTarget;

impl RenderTarget for LogTarget {
    fn attach(&self) {
        info!("panel attached");
    }

    fn show_placeholder(&self, title: &str, description: &str) {
        info!(title, description, "placeholder");
    }

    fn show_background(&self, url: Option<&str>) {
        info!(url = url.unwrap_or("-"), "background");
    }

    fn draw(&self, view: &DetailsView) {
        info!(
            head = %view.head,
            details = %view.details_line(),
            genres = view.genres.as_deref().unwrap_or(""),
            "details drawn"
        );
    }

    fn detach(&self) {
        info!("panel detached");
    }
}
