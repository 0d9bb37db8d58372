pub mod clock;
pub mod loader;
pub mod provider;
pub mod ratings;
pub mod record;
pub mod tmdb;
pub mod transport;
pub mod ttl_cache;

pub use loader::MetadataLoader;
pub use ratings::RatingsClient;
pub use record::MetadataRecord;
pub use ttl_cache::TtlCache;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetadataError {
    #[error("provider error: {0}")]
    Provider(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("not found")]
    NotFound,
    #[error("api key not configured")]
    MissingApiKey,
}
