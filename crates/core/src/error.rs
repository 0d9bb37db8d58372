use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static AUTH_FAILURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)invalid api key|unauthorized|forbidden").unwrap());

/// Every way a ratings fetch can fail.
///
/// The `Display` output is the user-facing error string stored in
/// [`RatingsResult::error`](crate::RatingsResult).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("invalid input")]
    InvalidInput,

    #[error("API key not configured")]
    ApiKeyMissing,

    #[error("request failed (status: {status})")]
    Transport { status: String },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("invalid response format")]
    Format,
}

impl FetchError {
    pub fn transport(status: impl std::fmt::Display) -> Self {
        Self::Transport {
            status: status.to_string(),
        }
    }

    /// Credential problems the user has to fix.
    pub fn is_auth(&self) -> bool {
        match self {
            Self::Transport { status } => status == "401" || status == "403",
            Self::Provider(message) => is_auth_message(message),
            _ => false,
        }
    }

    /// Whether a result carrying this error may be written to the ratings cache.
    ///
    /// Local failures never reach the cache and auth failures stay retryable.
    pub fn is_cacheable(&self) -> bool {
        match self {
            Self::InvalidInput | Self::ApiKeyMissing => false,
            Self::Transport { .. } | Self::Provider(_) => !self.is_auth(),
            Self::Format => true,
        }
    }
}

/// Case-insensitive match on the provider's authentication failure messages.
fn is_auth_message(message: &str) -> bool {
    AUTH_FAILURE_RE.is_match(message)
}
