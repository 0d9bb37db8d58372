pub mod config;
pub mod controller;
pub mod pipeline;
pub mod render;
pub mod target;

pub use controller::{PanelController, Phase};
pub use pipeline::Pipeline;
pub use render::{BadgeVariant, DetailsView, RatingBadge, Visibility, compose_details};
pub use target::{LogTarget, RecordingTarget, RenderEvent, RenderTarget};
