use ratingsline_core::MediaRef;

use crate::{MetadataError, MetadataRecord};

/// A source of canonical per-title details.
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Deterministic key identifying the details request for `media`.
    ///
    /// Two refs with the same key must produce the same record. May consult
    /// settings, so the key can change between calls for one ref.
    async fn request_key(&self, media: &MediaRef) -> String;

    /// Fetch full details for a movie or show.
    async fn get_details(&self, media: &MediaRef) -> Result<MetadataRecord, MetadataError>;
}
