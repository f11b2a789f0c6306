//! Credit cost calculation for batch productions.
//!
//! Pricing is a pure function of unit kind and duration, so an estimate can
//! be shown to the user before anything is generated and recomputed later
//! with identical results.
//!
//! # Example
//!
//! ```ignore
//! use reel_models::{CreditEstimator, plan_series_units};
//!
//! let estimate = CreditEstimator::new(&plan_series_units(&series)).estimate();
//! assert_eq!(estimate.total, estimate.per_unit.iter().sum::<u32>());
//! ```

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{MovieConfig, ProductionConfig, SeriesConfig};
use crate::limits::{CREDITS_PER_BLOCK, CREDIT_BLOCK_SECONDS, UNIT_BASE_CREDITS};
use crate::unit::{UnitKind, UnitSpec};
use crate::validation::{plan_movie_units, plan_series_units};

/// Credits for one unit of the given kind and duration.
///
/// `UNIT_BASE_CREDITS` plus `CREDITS_PER_BLOCK` for every started
/// `CREDIT_BLOCK_SECONDS` of footage, times the kind multiplier.
pub fn unit_cost(kind: UnitKind, duration_seconds: u32) -> u32 {
    let blocks = duration_seconds.div_ceil(CREDIT_BLOCK_SECONDS);
    blocks
        .saturating_mul(CREDITS_PER_BLOCK)
        .saturating_add(UNIT_BASE_CREDITS)
        .saturating_mul(kind.credit_multiplier())
}

// =============================================================================
// Estimate
// =============================================================================

/// Itemized credit cost of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditEstimate {
    /// Cost of each unit, in input order
    pub per_unit: Vec<u32>,
    /// Sum of `per_unit`
    pub total: u32,
}

impl CreditEstimate {
    /// Number of units covered by this estimate.
    pub fn unit_count(&self) -> usize {
        self.per_unit.len()
    }

    /// Cost of one unit, or 0 for an unknown index.
    pub fn unit(&self, index: usize) -> u32 {
        self.per_unit.get(index).copied().unwrap_or(0)
    }

    /// Generate a human-readable description for credit transactions.
    ///
    /// Format: "Produce N episode(s) of 'Title'"
    pub fn to_description(&self, kind: UnitKind, title: &str) -> String {
        let noun = match (kind, self.per_unit.len()) {
            (UnitKind::Episode, 1) => "episode",
            (UnitKind::Episode, _) => "episodes",
            (UnitKind::Act, 1) => "act",
            (UnitKind::Act, _) => "acts",
        };
        format!("Produce {} {} of '{}'", self.per_unit.len(), noun, title)
    }

    /// Convert to metadata for transaction recording.
    ///
    /// Keys produced:
    /// - `unit_count`: Number of units
    /// - `unit_breakdown`: Per-unit costs (format: "30,30,40")
    /// - `total_credits`: Grand total
    pub fn to_metadata(&self) -> HashMap<String, String> {
        let mut metadata = HashMap::new();

        metadata.insert("unit_count".to_string(), self.per_unit.len().to_string());

        let breakdown: Vec<String> = self.per_unit.iter().map(|c| c.to_string()).collect();
        metadata.insert("unit_breakdown".to_string(), breakdown.join(","));
        metadata.insert("total_credits".to_string(), self.total.to_string());

        metadata
    }
}

// =============================================================================
// Estimator
// =============================================================================

/// Computes the credit estimate for a set of planned units.
///
/// Never touches the render backend or the ledger.
#[derive(Debug, Clone)]
pub struct CreditEstimator<'a> {
    units: &'a [UnitSpec],
}

impl<'a> CreditEstimator<'a> {
    pub fn new(units: &'a [UnitSpec]) -> Self {
        Self { units }
    }

    /// Calculate the itemized estimate.
    pub fn estimate(&self) -> CreditEstimate {
        let per_unit: Vec<u32> = self
            .units
            .iter()
            .map(|u| unit_cost(u.kind, u.planned_duration_seconds))
            .collect();
        let total = per_unit.iter().fold(0u32, |acc, c| acc.saturating_add(*c));

        CreditEstimate { per_unit, total }
    }
}

/// Estimate a series config.
///
/// Safe on unvalidated input; validate first for a meaningful figure.
pub fn estimate_series(config: &SeriesConfig) -> CreditEstimate {
    CreditEstimator::new(&plan_series_units(config)).estimate()
}

/// Estimate a movie config. An explicitly empty act list estimates to zero.
pub fn estimate_movie(config: &MovieConfig) -> CreditEstimate {
    CreditEstimator::new(&plan_movie_units(config)).estimate()
}

/// Estimate either kind of config.
pub fn estimate_config(config: &ProductionConfig) -> CreditEstimate {
    match config {
        ProductionConfig::Series(c) => estimate_series(c),
        ProductionConfig::Movie(c) => estimate_movie(c),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActSpec, EpisodeSpec};

    fn series(count: usize, cap: u32) -> SeriesConfig {
        SeriesConfig {
            title: "Harbor Lights".to_string(),
            synopsis: "A fishing town keeps a secret.".to_string(),
            episodes: (1..=count)
                .map(|n| EpisodeSpec {
                    episode_number: n.to_string(),
                    title: format!("Episode {}", n),
                    synopsis: "...".to_string(),
                })
                .collect(),
            episode_duration_cap_seconds: cap,
        }
    }

    #[test]
    fn test_unit_cost_rounds_up_blocks() {
        assert_eq!(unit_cost(UnitKind::Episode, 30), 15);
        assert_eq!(unit_cost(UnitKind::Episode, 31), 20);
        assert_eq!(unit_cost(UnitKind::Episode, 120), 30);
        assert_eq!(unit_cost(UnitKind::Episode, 180), 40);
        assert_eq!(unit_cost(UnitKind::Episode, 0), 10);
    }

    #[test]
    fn test_episodes_and_acts_priced_identically() {
        assert_eq!(unit_cost(UnitKind::Episode, 90), unit_cost(UnitKind::Act, 90));
    }

    #[test]
    fn test_series_estimate() {
        let estimate = estimate_series(&series(5, 120));
        assert_eq!(estimate.per_unit, vec![30; 5]);
        assert_eq!(estimate.total, 150);
        assert_eq!(estimate.unit_count(), 5);
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let config = series(7, 95);
        assert_eq!(estimate_series(&config), estimate_series(&config));
    }

    #[test]
    fn test_movie_estimate() {
        let config = MovieConfig {
            title: "Drift".to_string(),
            synopsis: "Two sailors.".to_string(),
            acts: Some(
                (1..=3)
                    .map(|n| ActSpec {
                        act_number: n.to_string(),
                        title: format!("Act {}", n),
                        synopsis: "...".to_string(),
                    })
                    .collect(),
            ),
            target_duration_minutes_cap: 6,
        };

        // 360s / 3 acts = 120s each
        let estimate = estimate_movie(&config);
        assert_eq!(estimate.per_unit, vec![30, 30, 30]);
        assert_eq!(estimate_config(&ProductionConfig::Movie(config)).total, 90);
    }

    #[test]
    fn test_description_and_metadata() {
        let estimate = estimate_series(&series(2, 30));

        assert_eq!(
            estimate.to_description(UnitKind::Episode, "Harbor Lights"),
            "Produce 2 episodes of 'Harbor Lights'"
        );

        let metadata = estimate.to_metadata();
        assert_eq!(metadata.get("unit_count"), Some(&"2".to_string()));
        assert_eq!(metadata.get("unit_breakdown"), Some(&"15,15".to_string()));
        assert_eq!(metadata.get("total_credits"), Some(&"30".to_string()));
    }

    fn movie_with(acts: Option<Vec<ActSpec>>, minutes: u32) -> MovieConfig {
        MovieConfig {
            title: "Drift".to_string(),
            synopsis: "Two sailors.".to_string(),
            acts,
            target_duration_minutes_cap: minutes,
        }
    }

    #[test]
    fn test_movie_estimate_with_empty_acts_is_zero() {
        let estimate = estimate_movie(&movie_with(Some(vec![]), 10));
        assert!(estimate.per_unit.is_empty());
        assert_eq!(estimate.total, 0);
    }

    #[test]
    fn test_movie_estimate_with_huge_duration_saturates() {
        let estimate = estimate_movie(&movie_with(None, u32::MAX));
        assert_eq!(estimate.unit_count(), 1);
        assert!(estimate.total > 0);
        assert_eq!(estimate.total, estimate.per_unit[0]);
    }

    #[test]
    fn test_unit_cost_at_max_duration() {
        assert_eq!(unit_cost(UnitKind::Act, u32::MAX), u32::MAX / 30 * 5 + 5 + 10);
    }

    #[test]
    fn test_unknown_unit_index_costs_nothing() {
        let estimate = estimate_series(&series(1, 30));
        assert_eq!(estimate.unit(0), 15);
        assert_eq!(estimate.unit(9), 0);
    }
}
