//! Production configs submitted by callers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::limits::{MAX_EPISODE_DURATION_SECONDS, MAX_MOVIE_DURATION_MINUTES};

/// One episode of a series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeSpec {
    /// Display number, e.g. "1" or "S01E03"
    #[serde(default)]
    pub episode_number: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub synopsis: String,
}

/// One act of a movie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActSpec {
    #[serde(default)]
    pub act_number: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub synopsis: String,
}

/// A TV-style series of episodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeriesConfig {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub episodes: Vec<EpisodeSpec>,
    /// Length every episode is generated at
    #[serde(default = "default_episode_duration_cap")]
    pub episode_duration_cap_seconds: u32,
}

/// A movie, optionally broken into acts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MovieConfig {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub synopsis: String,
    /// When absent the movie is produced as a single act
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acts: Option<Vec<ActSpec>>,
    #[serde(default = "default_movie_duration_cap")]
    pub target_duration_minutes_cap: u32,
}

fn default_episode_duration_cap() -> u32 {
    MAX_EPISODE_DURATION_SECONDS
}

fn default_movie_duration_cap() -> u32 {
    MAX_MOVIE_DURATION_MINUTES
}

/// Kind of production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductionKind {
    Series,
    Movie,
}

impl ProductionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionKind::Series => "series",
            ProductionKind::Movie => "movie",
        }
    }
}

impl fmt::Display for ProductionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Config payload, tagged with its kind.
///
/// Serialized as `{"kind": "series", "config": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "config", rename_all = "snake_case")]
pub enum ProductionConfig {
    Series(SeriesConfig),
    Movie(MovieConfig),
}

impl ProductionConfig {
    pub fn kind(&self) -> ProductionKind {
        match self {
            ProductionConfig::Series(_) => ProductionKind::Series,
            ProductionConfig::Movie(_) => ProductionKind::Movie,
        }
    }

    /// Title of the series or movie.
    pub fn title(&self) -> &str {
        match self {
            ProductionConfig::Series(c) => &c.title,
            ProductionConfig::Movie(c) => &c.title,
        }
    }
}

/// Visual settings forwarded to the render backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductionSettings {
    /// Free-form style hint ("noir", "anime", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_style: Option<String>,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    /// Compute the cost without generating or billing anything
    #[serde(default)]
    pub estimate_only: bool,
}

fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

impl Default for ProductionSettings {
    fn default() -> Self {
        Self {
            visual_style: None,
            aspect_ratio: default_aspect_ratio(),
            estimate_only: false,
        }
    }
}

/// A request for one batch production run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductionRequest {
    pub project_id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub config: ProductionConfig,
    #[serde(default)]
    pub settings: ProductionSettings,
}

impl ProductionRequest {
    /// Create a series request with default settings.
    pub fn series(
        project_id: impl Into<String>,
        user_id: impl Into<String>,
        config: SeriesConfig,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            user_id: user_id.into(),
            config: ProductionConfig::Series(config),
            settings: ProductionSettings::default(),
        }
    }

    /// Create a movie request with default settings.
    pub fn movie(
        project_id: impl Into<String>,
        user_id: impl Into<String>,
        config: MovieConfig,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            user_id: user_id.into(),
            config: ProductionConfig::Movie(config),
            settings: ProductionSettings::default(),
        }
    }

    /// Replace the settings.
    pub fn with_settings(mut self, settings: ProductionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Switch to estimate-only mode.
    pub fn estimate_only(mut self) -> Self {
        self.settings.estimate_only = true;
        self
    }

    pub fn kind(&self) -> ProductionKind {
        self.config.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_request_from_json() {
        let json = r#"{
            "projectId": "p1",
            "userId": "u1",
            "kind": "series",
            "config": {
                "title": "Harbor Lights",
                "synopsis": "A fishing town keeps a secret.",
                "episodes": [
                    {"episodeNumber": "1", "title": "Fog", "synopsis": "The boat returns empty."}
                ]
            },
            "settings": {"estimateOnly": true}
        }"#;

        let request: ProductionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.kind(), ProductionKind::Series);
        assert!(request.settings.estimate_only);
        assert_eq!(request.settings.aspect_ratio, "16:9");

        match request.config {
            ProductionConfig::Series(series) => {
                assert_eq!(series.episodes.len(), 1);
                assert_eq!(series.episode_duration_cap_seconds, MAX_EPISODE_DURATION_SECONDS);
            }
            ProductionConfig::Movie(_) => panic!("expected series"),
        }
    }

    #[test]
    fn test_movie_request_defaults() {
        let json = r#"{
            "projectId": "p1",
            "userId": "u1",
            "kind": "movie",
            "config": {"title": "Drift", "synopsis": "Two sailors, one map."}
        }"#;

        let request: ProductionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.kind(), ProductionKind::Movie);
        assert!(!request.settings.estimate_only);

        match request.config {
            ProductionConfig::Movie(movie) => {
                assert!(movie.acts.is_none());
                assert_eq!(movie.target_duration_minutes_cap, MAX_MOVIE_DURATION_MINUTES);
            }
            ProductionConfig::Series(_) => panic!("expected movie"),
        }
    }

    #[test]
    fn test_request_serializes_kind_and_config() {
        let request = ProductionRequest::movie(
            "p1",
            "u1",
            MovieConfig {
                title: "Drift".to_string(),
                synopsis: "Two sailors.".to_string(),
                acts: None,
                target_duration_minutes_cap: 10,
            },
        );

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["kind"], "movie");
        assert_eq!(value["config"]["targetDurationMinutesCap"], 10);
        assert_eq!(value["projectId"], "p1");
    }
}
