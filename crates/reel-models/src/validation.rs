//! Config validation and unit planning.
//!
//! Validation is all-or-nothing: the first violation found is returned and
//! nothing else is inspected. Checks run in a fixed order:
//!
//! 1. missing title
//! 2. missing synopsis
//! 3. missing or empty unit list
//! 4. unit-count bound
//! 5. duration bound
//! 6. per-unit required fields, in unit order

use thiserror::Error;

use crate::config::{MovieConfig, SeriesConfig};
use crate::limits::{
    MAX_ACTS, MAX_EPISODES, MAX_EPISODE_DURATION_SECONDS, MAX_MOVIE_DURATION_MINUTES,
};
use crate::unit::{UnitKind, UnitSpec};

/// A config field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {field}: {reason}")]
pub struct ValidationError {
    /// Field path in caller terms, e.g. `episodes[2].title`
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    fn required(field: impl Into<String>) -> Self {
        Self::new(field, "is required")
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Validate a series config.
pub fn validate_series(config: &SeriesConfig) -> Result<(), ValidationError> {
    if is_blank(&config.title) {
        return Err(ValidationError::required("title"));
    }
    if is_blank(&config.synopsis) {
        return Err(ValidationError::required("synopsis"));
    }
    if config.episodes.is_empty() {
        return Err(ValidationError::new(
            "episodes",
            "at least one episode is required",
        ));
    }
    if config.episodes.len() > MAX_EPISODES {
        return Err(ValidationError::new(
            "episodes",
            format!(
                "at most {} episodes are allowed (got {})",
                MAX_EPISODES,
                config.episodes.len()
            ),
        ));
    }

    let cap = config.episode_duration_cap_seconds;
    if cap == 0 || cap > MAX_EPISODE_DURATION_SECONDS {
        return Err(ValidationError::new(
            "episodeDurationCapSeconds",
            format!(
                "must be between 1 and {} seconds (got {})",
                MAX_EPISODE_DURATION_SECONDS, cap
            ),
        ));
    }

    for (i, episode) in config.episodes.iter().enumerate() {
        if is_blank(&episode.episode_number) {
            return Err(ValidationError::required(format!("episodes[{}].episodeNumber", i)));
        }
        if is_blank(&episode.title) {
            return Err(ValidationError::required(format!("episodes[{}].title", i)));
        }
        if is_blank(&episode.synopsis) {
            return Err(ValidationError::required(format!("episodes[{}].synopsis", i)));
        }
    }

    Ok(())
}

/// Validate a movie config.
///
/// A movie without acts is valid and is produced as a single act. An
/// explicitly empty act list is rejected.
pub fn validate_movie(config: &MovieConfig) -> Result<(), ValidationError> {
    if is_blank(&config.title) {
        return Err(ValidationError::required("title"));
    }
    if is_blank(&config.synopsis) {
        return Err(ValidationError::required("synopsis"));
    }

    if let Some(acts) = &config.acts {
        if acts.is_empty() {
            return Err(ValidationError::new(
                "acts",
                "must contain at least one act when provided",
            ));
        }
        if acts.len() > MAX_ACTS {
            return Err(ValidationError::new(
                "acts",
                format!("at most {} acts are allowed (got {})", MAX_ACTS, acts.len()),
            ));
        }
    }

    let cap = config.target_duration_minutes_cap;
    if cap == 0 || cap > MAX_MOVIE_DURATION_MINUTES {
        return Err(ValidationError::new(
            "targetDurationMinutesCap",
            format!(
                "must be between 1 and {} minutes (got {})",
                MAX_MOVIE_DURATION_MINUTES, cap
            ),
        ));
    }

    if let Some(acts) = &config.acts {
        for (i, act) in acts.iter().enumerate() {
            if is_blank(&act.act_number) {
                return Err(ValidationError::required(format!("acts[{}].actNumber", i)));
            }
            if is_blank(&act.title) {
                return Err(ValidationError::required(format!("acts[{}].title", i)));
            }
            if is_blank(&act.synopsis) {
                return Err(ValidationError::required(format!("acts[{}].synopsis", i)));
            }
        }
    }

    Ok(())
}

/// Expand a validated series config into one unit per episode.
pub fn plan_series_units(config: &SeriesConfig) -> Vec<UnitSpec> {
    config
        .episodes
        .iter()
        .enumerate()
        .map(|(i, episode)| UnitSpec {
            unit_index: i,
            kind: UnitKind::Episode,
            label: episode.episode_number.trim().to_string(),
            title: episode.title.trim().to_string(),
            synopsis: episode.synopsis.trim().to_string(),
            production_title: config.title.trim().to_string(),
            planned_duration_seconds: config.episode_duration_cap_seconds,
        })
        .collect()
}

/// Expand a validated movie config into one unit per act.
///
/// The movie duration is split evenly across acts. Whole minutes always
/// divide evenly by any act count up to `MAX_ACTS`. Unvalidated configs are
/// planned without panicking: the duration saturates and an empty act list
/// yields no units.
pub fn plan_movie_units(config: &MovieConfig) -> Vec<UnitSpec> {
    let total_seconds = config.target_duration_minutes_cap.saturating_mul(60);
    let production_title = config.title.trim().to_string();

    let acts: Vec<(String, String, String)> = match &config.acts {
        Some(acts) => acts
            .iter()
            .map(|a| {
                (
                    a.act_number.trim().to_string(),
                    a.title.trim().to_string(),
                    a.synopsis.trim().to_string(),
                )
            })
            .collect(),
        None => vec![(
            "1".to_string(),
            production_title.clone(),
            config.synopsis.trim().to_string(),
        )],
    };

    let per_act = total_seconds / acts.len().max(1) as u32;

    acts.into_iter()
        .enumerate()
        .map(|(i, (label, title, synopsis))| UnitSpec {
            unit_index: i,
            kind: UnitKind::Act,
            label,
            title,
            synopsis,
            production_title: production_title.clone(),
            planned_duration_seconds: per_act,
        })
        .collect()
}
