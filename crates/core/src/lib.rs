pub mod config;
pub mod error;
pub mod types;

pub use config::PipelineConfig;
pub use error::FetchError;
pub use types::{FocusItem, MediaRef, MediaType, Provider, RatingsResult};
