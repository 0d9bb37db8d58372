//! Turns a metadata record plus ratings into the strings a panel shows.

use std::collections::HashSet;

use ratingsline_core::{Provider, RatingsResult};
use ratingsline_metadata::MetadataRecord;
use serde::Serialize;

/// Rotten Tomatoes threshold between the fresh and rotten badge.
const FRESH_THRESHOLD: f64 = 60.0;

const SPLIT: &str = " \u{25CF} ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeVariant {
    Fresh,
    Rotten,
    Upright,
    Spilled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingBadge {
    pub provider: Provider,
    pub score: String,
    pub variant: Option<BadgeVariant>,
}

impl std::fmt::Display for RatingBadge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.provider.label(), self.score)?;
        if let Some(variant) = self.variant {
            write!(f, " ({variant:?})")?;
        }
        Ok(())
    }
}

/// Everything drawn once details for the focused title are known.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetailsView {
    /// Year and countries, e.g. `2010, United Kingdom, United States`.
    pub head: String,
    pub badges: Vec<RatingBadge>,
    pub runtime: Option<String>,
    pub content_rating: Option<String>,
    pub genres: Option<String>,
}

impl DetailsView {
    /// Badges, runtime and content rating on one line.
    pub fn details_line(&self) -> String {
        self.badges
            .iter()
            .map(|b| b.to_string())
            .chain(self.runtime.clone())
            .chain(self.content_rating.clone())
            .collect::<Vec<_>>()
            .join(SPLIT)
    }

    pub fn has_badge(&self, provider: Provider) -> bool {
        self.badges.iter().any(|b| b.provider == provider)
    }
}

/// Which providers to show, read from settings at draw time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Visibility(HashSet<Provider>);

impl Visibility {
    pub fn defaults() -> Self {
        Self(
            Provider::DISPLAY_ORDER
                .into_iter()
                .filter(|p| p.default_visible())
                .collect(),
        )
    }

    pub fn all() -> Self {
        Self(Provider::DISPLAY_ORDER.into_iter().collect())
    }

    pub fn only(providers: &[Provider]) -> Self {
        Self(providers.iter().copied().collect())
    }

    pub fn is_visible(&self, provider: Provider) -> bool {
        self.0.contains(&provider)
    }
}

pub fn compose_details(
    record: &MetadataRecord,
    ratings: Option<&RatingsResult>,
    visibility: &Visibility,
    region: &str,
) -> DetailsView {
    let mut head: Vec<String> = Vec::new();
    if let Some(year) = record.year() {
        head.push(year.to_string());
    }
    let countries = record.countries();
    if !countries.is_empty() {
        head.push(countries.join(", "));
    }

    let badges = Provider::DISPLAY_ORDER
        .into_iter()
        .filter(|p| visibility.is_visible(*p))
        .filter_map(|p| badge(p, ratings, record))
        .collect();

    let genres = record.genres();
    let genres = (!genres.is_empty()).then(|| {
        genres
            .iter()
            .map(|g| capitalize_first(g))
            .collect::<Vec<_>>()
            .join(" | ")
    });

    DetailsView {
        head: head.join(", "),
        badges,
        runtime: record.runtime_minutes().map(format_runtime),
        content_rating: record.content_rating(region),
        genres,
    }
}

fn badge(
    provider: Provider,
    ratings: Option<&RatingsResult>,
    record: &MetadataRecord,
) -> Option<RatingBadge> {
    let score = ratings.and_then(|r| r.score(provider.source_key()));

    let (score, text) = match provider {
        Provider::Tmdb => match score {
            Some(s) => (s, format_plain(s)),
            // The details record carries TMDB's own vote average.
            None => {
                let vote = record.vote_average().filter(|v| *v > 0.0)?;
                (vote, format!("{vote:.1}"))
            }
        },
        Provider::Imdb | Provider::Letterboxd | Provider::RogerEbert => {
            let s = score?;
            (s, format!("{s:.1}"))
        }
        _ => {
            let s = score?;
            (s, format_plain(s))
        }
    };

    if score < 0.0 {
        return None;
    }

    let variant = match provider {
        Provider::Tomatoes if score >= FRESH_THRESHOLD => Some(BadgeVariant::Fresh),
        Provider::Tomatoes => Some(BadgeVariant::Rotten),
        Provider::Audience if score >= FRESH_THRESHOLD => Some(BadgeVariant::Upright),
        Provider::Audience => Some(BadgeVariant::Spilled),
        _ => None,
    };

    Some(RatingBadge {
        provider,
        score: text,
        variant,
    })
}

/// `85.0` -> `85`, `7.25` -> `7.25`.
fn format_plain(score: f64) -> String {
    score.to_string()
}

fn format_runtime(minutes: i32) -> String {
    let (h, m) = (minutes / 60, minutes % 60);
    match (h, m) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use ratingsline_core::MediaType;
    use serde_json::json;

    use super::*;

    fn inception() -> MetadataRecord {
        MetadataRecord::new(
            MediaType::Movie,
            json!({
                "id": 27205,
                "title": "Inception",
                "release_date": "2010-07-16",
                "runtime": 148,
                "vote_average": 8.4,
                "genres": [{ "name": "action" }, { "name": "science fiction" }],
                "production_countries": [{ "name": "United Kingdom" }],
                "release_dates": { "results": [
                    { "iso_3166_1": "US", "release_dates": [{ "certification": "PG-13" }] }
                ] }
            }),
        )
    }

    fn ratings(pairs: &[(&str, f64)]) -> RatingsResult {
        RatingsResult {
            scores: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            error: None,
        }
    }

    #[test]
    fn composes_head_details_and_genres() {
        let r = ratings(&[("imdb", 8.8), ("metacritic", 74.0)]);
        let view = compose_details(&inception(), Some(&r), &Visibility::defaults(), "US");

        assert_eq!(view.head, "2010, United Kingdom");
        assert_eq!(view.badges.len(), 2);
        assert_eq!(view.badges[0].provider, Provider::Imdb);
        assert_eq!(view.badges[0].score, "8.8");
        // No tmdb score from the ratings provider: falls back to the vote average.
        assert_eq!(view.badges[1].provider, Provider::Tmdb);
        assert_eq!(view.badges[1].score, "8.4");
        assert_eq!(view.runtime.as_deref(), Some("2h 28m"));
        assert_eq!(view.content_rating.as_deref(), Some("PG-13"));
        assert_eq!(view.genres.as_deref(), Some("Action | Science fiction"));
        assert!(view.details_line().starts_with("IMDb 8.8"));
        assert!(view.details_line().ends_with("PG-13"));
    }

    #[test]
    fn missing_scores_render_nothing_not_zero() {
        let r = RatingsResult::from_error(&ratingsline_core::FetchError::ApiKeyMissing);
        let view = compose_details(&inception(), Some(&r), &Visibility::all(), "US");

        // Only TMDB survives, through the record's own vote average.
        assert_eq!(view.badges.len(), 1);
        assert_eq!(view.badges[0].provider, Provider::Tmdb);
        assert!(!view.details_line().contains("0.0"));
    }

    #[test]
    fn hidden_providers_are_skipped_in_display_order() {
        let r = ratings(&[
            ("letterboxd", 4.2),
            ("imdb", 8.8),
            ("trakt", 86.0),
            ("tomatoes", 87.0),
        ]);
        let visibility = Visibility::only(&[Provider::Letterboxd, Provider::Tomatoes, Provider::Imdb]);
        let view = compose_details(&inception(), Some(&r), &visibility, "US");

        let order: Vec<_> = view.badges.iter().map(|b| b.provider).collect();
        assert_eq!(order, vec![Provider::Imdb, Provider::Tomatoes, Provider::Letterboxd]);
        assert!(!view.has_badge(Provider::Trakt));
    }

    #[test]
    fn tomatoes_variants_follow_threshold() {
        let r = ratings(&[("tomatoes", 59.0), ("popcorn", 60.0)]);
        let visibility = Visibility::only(&[Provider::Tomatoes, Provider::Audience]);
        let view = compose_details(&inception(), Some(&r), &visibility, "US");

        assert_eq!(view.badges[0].variant, Some(BadgeVariant::Rotten));
        assert_eq!(view.badges[0].score, "59");
        assert_eq!(view.badges[1].variant, Some(BadgeVariant::Upright));
    }

    #[test]
    fn negative_scores_are_hidden() {
        let r = ratings(&[("metacritic", -1.0), ("rogerebert", 3.5)]);
        let visibility = Visibility::only(&[Provider::Metacritic, Provider::RogerEbert]);
        let view = compose_details(&inception(), Some(&r), &visibility, "US");

        assert_eq!(view.badges.len(), 1);
        assert_eq!(view.badges[0].score, "3.5");
    }

    #[test]
    fn runtime_formats() {
        assert_eq!(format_runtime(45), "45m");
        assert_eq!(format_runtime(120), "2h");
        assert_eq!(format_runtime(148), "2h 28m");
    }
}
