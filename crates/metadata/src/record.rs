use ratingsline_core::MediaType;
use serde::Serialize;

/// Provider-native title details, passed through untouched.
///
/// Only the handful of fields the panel shows are interpreted, and only on
/// demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataRecord {
    media_type: MediaType,
    raw: serde_json::Value,
}

impl MetadataRecord {
    pub fn new(media_type: MediaType, raw: serde_json::Value) -> Self {
        Self { media_type, raw }
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn id(&self) -> Option<String> {
        match &self.raw["id"] {
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.raw["title"].as_str().or_else(|| self.raw["name"].as_str())
    }

    /// Release date for movies, first air date for shows.
    pub fn premiere_date(&self) -> Option<&str> {
        self.raw["release_date"]
            .as_str()
            .or_else(|| self.raw["first_air_date"].as_str())
            .filter(|d| !d.is_empty())
    }

    pub fn year(&self) -> Option<i32> {
        self.premiere_date()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok())
    }

    pub fn vote_average(&self) -> Option<f64> {
        self.raw["vote_average"].as_f64()
    }

    pub fn runtime_minutes(&self) -> Option<i32> {
        self.raw["runtime"]
            .as_i64()
            .or_else(|| {
                self.raw["episode_run_time"]
                    .as_array()
                    .and_then(|a| a.first())
                    .and_then(|v| v.as_i64())
            })
            .filter(|m| *m > 0)
            .map(|m| m as i32)
    }

    pub fn genres(&self) -> Vec<String> {
        self.raw["genres"]
            .as_array()
            .map(|gs| {
                gs.iter()
                    .filter_map(|g| g["name"].as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Production country names, falling back to origin country codes.
    pub fn countries(&self) -> Vec<String> {
        let names: Vec<String> = self.raw["production_countries"]
            .as_array()
            .map(|cs| {
                cs.iter()
                    .filter_map(|c| c["name"].as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        if !names.is_empty() {
            return names;
        }

        self.raw["origin_country"]
            .as_array()
            .map(|cs| {
                cs.iter()
                    .filter_map(|c| c.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Age certification for `region`, falling back to the US one.
    ///
    /// Movies carry it in `release_dates`, shows in `content_ratings`; both
    /// need `append_to_response` on the details request.
    pub fn content_rating(&self, region: &str) -> Option<String> {
        self.certification_for(region)
            .or_else(|| self.certification_for("US"))
    }

    fn certification_for(&self, region: &str) -> Option<String> {
        let matches_region =
            |r: &&serde_json::Value| r["iso_3166_1"].as_str() == Some(region);

        let from_release_dates = self.raw["release_dates"]["results"]
            .as_array()
            .and_then(|rs| rs.iter().find(matches_region))
            .and_then(|r| r["release_dates"].as_array())
            .and_then(|dates| {
                dates
                    .iter()
                    .filter_map(|d| d["certification"].as_str())
                    .find(|c| !c.is_empty())
            });

        let from_content_ratings = || {
            self.raw["content_ratings"]["results"]
                .as_array()
                .and_then(|rs| rs.iter().find(matches_region))
                .and_then(|r| r["rating"].as_str())
                .filter(|c| !c.is_empty())
        };

        from_release_dates
            .or_else(from_content_ratings)
            .map(|c| c.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movie_fields_from_json() {
        let record = MetadataRecord::new(
            MediaType::Movie,
            serde_json::json!({
                "id": 27205,
                "title": "Inception",
                "release_date": "2010-07-16",
                "runtime": 148,
                "vote_average": 8.4,
                "genres": [
                    { "id": 28, "name": "Action" },
                    { "id": 878, "name": "Science Fiction" }
                ],
                "production_countries": [
                    { "iso_3166_1": "GB", "name": "United Kingdom" },
                    { "iso_3166_1": "US", "name": "United States of America" }
                ],
                "release_dates": {
                    "results": [
                        { "iso_3166_1": "DE", "release_dates": [{ "certification": "12" }] },
                        { "iso_3166_1": "US", "release_dates": [
                            { "certification": "" },
                            { "certification": "PG-13" }
                        ] }
                    ]
                }
            }),
        );

        assert_eq!(record.id().as_deref(), Some("27205"));
        assert_eq!(record.title(), Some("Inception"));
        assert_eq!(record.year(), Some(2010));
        assert_eq!(record.runtime_minutes(), Some(148));
        assert!((record.vote_average().unwrap() - 8.4).abs() < 0.01);
        assert_eq!(record.genres(), vec!["Action", "Science Fiction"]);
        assert_eq!(record.countries().len(), 2);
        assert_eq!(record.content_rating("DE").as_deref(), Some("12"));
        assert_eq!(record.content_rating("FR").as_deref(), Some("PG-13"));
    }

    #[test]
    fn series_fields_from_json() {
        let record = MetadataRecord::new(
            MediaType::Show,
            serde_json::json!({
                "id": 1396,
                "name": "Breaking Bad",
                "first_air_date": "2008-01-20",
                "episode_run_time": [47],
                "origin_country": ["US"],
                "content_ratings": {
                    "results": [{ "iso_3166_1": "US", "rating": "TV-MA" }]
                }
            }),
        );

        assert_eq!(record.title(), Some("Breaking Bad"));
        assert_eq!(record.year(), Some(2008));
        assert_eq!(record.runtime_minutes(), Some(47));
        assert_eq!(record.countries(), vec!["US"]);
        assert_eq!(record.content_rating("US").as_deref(), Some("TV-MA"));
        assert!(record.genres().is_empty());
    }

    #[test]
    fn missing_fields_are_none() {
        let record = MetadataRecord::new(
            MediaType::Movie,
            serde_json::json!({ "release_date": "", "runtime": 0 }),
        );
        assert_eq!(record.year(), None);
        assert_eq!(record.runtime_minutes(), None);
        assert_eq!(record.content_rating("US"), None);
    }
}
