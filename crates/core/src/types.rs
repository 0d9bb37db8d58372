use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::FetchError;

/// Kind of title, as understood by the ratings provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    Show,
}

impl MediaType {
    /// Path segment used by the ratings provider.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Show => "show",
        }
    }

    /// Path segment used by the metadata provider (TMDB calls shows `tv`).
    pub fn tmdb_segment(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Show => "tv",
        }
    }

    /// Map the host's `method` field onto a media type.
    pub fn from_method(method: &str) -> Option<Self> {
        match method.trim().to_ascii_lowercase().as_str() {
            "movie" => Some(Self::Movie),
            "tv" | "show" => Some(Self::Show),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies the title currently displayed by a panel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef {
    pub id: String,
    pub media_type: MediaType,
}

impl MediaRef {
    pub fn new(id: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            id: id.into(),
            media_type,
        }
    }
}

/// A focused card as handed over by the host UI.
///
/// Only `id` and `method` are needed to fetch anything; the rest is used for
/// the placeholder written before any fetch settles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FocusItem {
    #[serde(default, deserialize_with = "id_from_number_or_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
}

impl FocusItem {
    /// Returns `None` when the identifying fields are missing or unusable.
    pub fn media_ref(&self) -> Option<MediaRef> {
        let id = self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;
        let media_type = self.method.as_deref().and_then(MediaType::from_method)?;
        Some(MediaRef::new(id, media_type))
    }

    /// Ref for the details request, which only needs an id.
    ///
    /// Without a usable `method` the type is guessed: shows carry `name`,
    /// movies carry `title`.
    pub fn metadata_ref(&self) -> Option<MediaRef> {
        if let Some(media) = self.media_ref() {
            return Some(media);
        }
        let id = self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;
        let media_type = if self.title.is_none() && self.name.is_some() {
            MediaType::Show
        } else {
            MediaType::Movie
        };
        Some(MediaRef::new(id, media_type))
    }

    /// Title for the placeholder: movies carry `title`, shows carry `name`.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_default()
    }

    /// Overview for the placeholder, or a fixed fallback when there is none.
    pub fn description(&self) -> &str {
        self.overview
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .unwrap_or(NO_DESCRIPTION)
    }
}

pub const NO_DESCRIPTION: &str = "No description";

fn id_from_number_or_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Aggregated ratings for one title.
///
/// Serialises flat, e.g. `{"imdb":7.8,"metacritic":85.0,"error":null}`.
/// Providers without a score are absent, never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingsResult {
    #[serde(flatten)]
    pub scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RatingsResult {
    pub fn from_error(err: &FetchError) -> Self {
        Self {
            scores: BTreeMap::new(),
            error: Some(err.to_string()),
        }
    }

    pub fn score(&self, source: &str) -> Option<f64> {
        self.scores.get(source).copied()
    }
}

/// Rating sources the panel knows how to display, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Imdb,
    Tmdb,
    Tomatoes,
    Audience,
    Metacritic,
    Trakt,
    Letterboxd,
    RogerEbert,
}

impl Provider {
    pub const DISPLAY_ORDER: [Provider; 8] = [
        Self::Imdb,
        Self::Tmdb,
        Self::Tomatoes,
        Self::Audience,
        Self::Metacritic,
        Self::Trakt,
        Self::Letterboxd,
        Self::RogerEbert,
    ];

    /// Key under which the ratings provider reports this source.
    pub fn source_key(self) -> &'static str {
        match self {
            Self::Imdb => "imdb",
            Self::Tmdb => "tmdb",
            Self::Tomatoes => "tomatoes",
            Self::Audience => "popcorn",
            Self::Metacritic => "metacritic",
            Self::Trakt => "trakt",
            Self::Letterboxd => "letterboxd",
            Self::RogerEbert => "rogerebert",
        }
    }

    /// Settings key holding the visibility flag.
    pub fn setting_key(self) -> &'static str {
        match self {
            Self::Imdb => "show_rating_imdb",
            Self::Tmdb => "show_rating_tmdb",
            Self::Tomatoes => "show_rating_tomatoes",
            Self::Audience => "show_rating_audience",
            Self::Metacritic => "show_rating_metacritic",
            Self::Trakt => "show_rating_trakt",
            Self::Letterboxd => "show_rating_letterboxd",
            Self::RogerEbert => "show_rating_rogerebert",
        }
    }

    pub fn default_visible(self) -> bool {
        matches!(self, Self::Imdb | Self::Tmdb)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Imdb => "IMDb",
            Self::Tmdb => "TMDB",
            Self::Tomatoes => "Rotten Tomatoes (Critics)",
            Self::Audience => "Rotten Tomatoes (Audience)",
            Self::Metacritic => "Metacritic",
            Self::Trakt => "Trakt",
            Self::Letterboxd => "Letterboxd",
            Self::RogerEbert => "Roger Ebert",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.source_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focus_item_maps_host_method() {
        let item: FocusItem = serde_json::from_value(serde_json::json!({
            "id": 1396,
            "method": "tv",
            "name": "Breaking Bad"
        }))
        .unwrap();

        let media = item.media_ref().unwrap();
        assert_eq!(media.id, "1396");
        assert_eq!(media.media_type, MediaType::Show);
        assert_eq!(media.media_type.tmdb_segment(), "tv");
        assert_eq!(item.display_title(), "Breaking Bad");
    }

    #[test]
    fn description_falls_back_when_overview_is_blank() {
        let mut item = FocusItem {
            overview: Some("  A clerk starts a fight club. ".into()),
            ..Default::default()
        };
        assert_eq!(item.description(), "A clerk starts a fight club.");

        item.overview = Some("   ".into());
        assert_eq!(item.description(), NO_DESCRIPTION);
        item.overview = None;
        assert_eq!(item.description(), NO_DESCRIPTION);
    }

    #[test]
    fn focus_item_without_method_has_no_media_ref() {
        let item = FocusItem {
            id: Some("550".into()),
            title: Some("Fight Club".into()),
            ..Default::default()
        };
        assert!(item.media_ref().is_none());

        let blank_id = FocusItem {
            id: Some("  ".into()),
            method: Some("movie".into()),
            ..Default::default()
        };
        assert!(blank_id.media_ref().is_none());
    }

    #[test]
    fn metadata_ref_guesses_type_without_method() {
        let show = FocusItem {
            id: Some("1396".into()),
            name: Some("Breaking Bad".into()),
            ..Default::default()
        };
        assert_eq!(
            show.metadata_ref(),
            Some(MediaRef::new("1396", MediaType::Show))
        );

        let movie = FocusItem {
            id: Some("550".into()),
            title: Some("Fight Club".into()),
            ..Default::default()
        };
        assert_eq!(
            movie.metadata_ref(),
            Some(MediaRef::new("550", MediaType::Movie))
        );

        assert!(FocusItem::default().metadata_ref().is_none());
    }

    #[test]
    fn ratings_result_serializes_flat() {
        let mut result = RatingsResult::default();
        result.scores.insert("imdb".into(), 7.8);
        result.scores.insert("metacritic".into(), 85.0);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "imdb": 7.8, "metacritic": 85.0, "error": null })
        );

        let back: RatingsResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn error_result_has_no_scores() {
        let result = RatingsResult::from_error(&FetchError::ApiKeyMissing);
        assert!(result.scores.is_empty());
        assert_eq!(result.error.as_deref(), Some("API key not configured"));
    }

    #[test]
    fn only_imdb_and_tmdb_visible_by_default() {
        let visible: Vec<_> = Provider::DISPLAY_ORDER
            .iter()
            .filter(|p| p.default_visible())
            .collect();
        assert_eq!(visible, vec![&Provider::Imdb, &Provider::Tmdb]);
    }
}
