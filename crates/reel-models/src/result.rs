//! Per-unit and per-batch production results.
//!
//! A batch always yields one `ProductionUnitResult` per input unit, in input
//! order. Partial failure is expressed through `UnitStatus`, never by
//! dropping results, so callers decode a single response shape.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::batch::BatchId;
use crate::unit::UnitSpec;

/// Prefix of the error message carried by units that were never started.
pub const ABORTED_PREFIX: &str = "aborted";

/// Terminal status of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Succeeded,
    Failed,
}

/// Outcome of one unit. Never mutated after the unit completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductionUnitResult {
    pub unit_index: usize,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    /// Always 0 for failed units
    pub credits_charged: u32,
    pub status: UnitStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Render attempts made (0 for aborted units)
    pub attempts: u32,
}

impl ProductionUnitResult {
    /// A unit that produced an artifact.
    pub fn succeeded(
        unit: &UnitSpec,
        artifact_url: impl Into<String>,
        duration_seconds: u32,
        credits_charged: u32,
        attempts: u32,
    ) -> Self {
        Self {
            unit_index: unit.unit_index,
            title: unit.title.clone(),
            artifact_url: Some(artifact_url.into()),
            duration_seconds: Some(duration_seconds),
            credits_charged,
            status: UnitStatus::Succeeded,
            error_message: None,
            attempts,
        }
    }

    /// A unit whose generation failed.
    pub fn failed(unit: &UnitSpec, error_message: impl Into<String>, attempts: u32) -> Self {
        Self {
            unit_index: unit.unit_index,
            title: unit.title.clone(),
            artifact_url: None,
            duration_seconds: None,
            credits_charged: 0,
            status: UnitStatus::Failed,
            error_message: Some(error_message.into()),
            attempts,
        }
    }

    /// A unit that was never admitted because the batch was aborted.
    pub fn aborted(unit: &UnitSpec, reason: impl std::fmt::Display) -> Self {
        Self::failed(unit, format!("{}: {}", ABORTED_PREFIX, reason), 0)
    }

    pub fn is_success(&self) -> bool {
        self.status == UnitStatus::Succeeded
    }

    pub fn is_aborted(&self) -> bool {
        self.status == UnitStatus::Failed
            && self
                .error_message
                .as_deref()
                .is_some_and(|m| m.starts_with(ABORTED_PREFIX))
    }
}

/// Progress of a batch. The final snapshot is embedded in the batch result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub total_units: usize,
    pub completed_units: usize,
    pub failed_units: usize,
    pub unit_results: Vec<ProductionUnitResult>,
}

impl ProgressSnapshot {
    /// Empty snapshot for a batch of `total_units`.
    pub fn new(total_units: usize) -> Self {
        Self {
            total_units,
            completed_units: 0,
            failed_units: 0,
            unit_results: Vec::with_capacity(total_units),
        }
    }

    /// Append a result and update the counters.
    pub fn record(&mut self, result: ProductionUnitResult) {
        match result.status {
            UnitStatus::Succeeded => self.completed_units += 1,
            UnitStatus::Failed => self.failed_units += 1,
        }
        self.unit_results.push(result);
    }

    /// Build a snapshot from results already in input order.
    pub fn from_results(results: Vec<ProductionUnitResult>) -> Self {
        let mut snapshot = Self::new(results.len());
        for result in results {
            snapshot.record(result);
        }
        snapshot
    }

    /// True when every unit has a terminal result.
    pub fn is_resolved(&self) -> bool {
        self.completed_units + self.failed_units == self.total_units
    }

    /// Credits charged across succeeded units.
    pub fn credits_charged(&self) -> u32 {
        self.unit_results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.credits_charged)
            .sum()
    }
}

/// Caller-facing summary of one generated artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub unit_index: usize,
    pub title: String,
    pub url: String,
    pub duration_seconds: u32,
    pub credits_charged: u32,
}

/// Final result of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchProductionResult {
    /// False only when zero units succeeded
    pub success: bool,
    pub batch_id: BatchId,
    pub title: String,
    /// Succeeded units only, in input order
    pub videos: Vec<VideoSummary>,
    pub total_duration_seconds: u32,
    pub total_credits_used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_remaining: Option<u32>,
    pub progress: ProgressSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchProductionResult {
    /// Derive the caller-facing fields from a finished snapshot.
    pub fn from_progress(
        batch_id: BatchId,
        title: impl Into<String>,
        progress: ProgressSnapshot,
    ) -> Self {
        let videos: Vec<VideoSummary> = progress
            .unit_results
            .iter()
            .filter(|r| r.is_success())
            .filter_map(|r| {
                Some(VideoSummary {
                    unit_index: r.unit_index,
                    title: r.title.clone(),
                    url: r.artifact_url.clone()?,
                    duration_seconds: r.duration_seconds.unwrap_or(0),
                    credits_charged: r.credits_charged,
                })
            })
            .collect();

        let total_duration_seconds = videos.iter().map(|v| v.duration_seconds).sum();
        let total_credits_used = videos.iter().map(|v| v.credits_charged).sum();

        Self {
            success: !videos.is_empty(),
            batch_id,
            title: title.into(),
            videos,
            total_duration_seconds,
            total_credits_used,
            credits_remaining: None,
            progress,
            error: None,
        }
    }

    /// True when at least one unit failed, whatever `success` says.
    pub fn is_partial(&self) -> bool {
        self.success && self.progress.failed_units > 0
    }
}

/// Response to an estimate-only request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResponse {
    pub success: bool,
    pub estimated_credits: u32,
    pub per_unit_credits: Vec<u32>,
}

/// Everything a production request can return on the non-error path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ProductionResponse {
    Estimate(EstimateResponse),
    Completed(BatchProductionResult),
}

impl ProductionResponse {
    pub fn success(&self) -> bool {
        match self {
            ProductionResponse::Estimate(e) => e.success,
            ProductionResponse::Completed(r) => r.success,
        }
    }

    pub fn as_batch(&self) -> Option<&BatchProductionResult> {
        match self {
            ProductionResponse::Completed(r) => Some(r),
            ProductionResponse::Estimate(_) => None,
        }
    }

    pub fn into_batch(self) -> Option<BatchProductionResult> {
        match self {
            ProductionResponse::Completed(r) => Some(r),
            ProductionResponse::Estimate(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitKind;

    fn unit(index: usize) -> UnitSpec {
        UnitSpec {
            unit_index: index,
            kind: UnitKind::Episode,
            label: (index + 1).to_string(),
            title: format!("Episode {}", index + 1),
            synopsis: "...".to_string(),
            production_title: "Harbor Lights".to_string(),
            planned_duration_seconds: 60,
        }
    }

    #[test]
    fn test_snapshot_counts() {
        let snapshot = ProgressSnapshot::from_results(vec![
            ProductionUnitResult::succeeded(&unit(0), "https://cdn/0.mp4", 60, 20, 1),
            ProductionUnitResult::failed(&unit(1), "backend exploded", 2),
            ProductionUnitResult::aborted(&unit(2), "cancelled"),
        ]);

        assert_eq!(snapshot.total_units, 3);
        assert_eq!(snapshot.completed_units, 1);
        assert_eq!(snapshot.failed_units, 2);
        assert!(snapshot.is_resolved());
        assert_eq!(snapshot.credits_charged(), 20);
    }

    #[test]
    fn test_aborted_unit() {
        let result = ProductionUnitResult::aborted(&unit(4), "cancelled");
        assert!(result.is_aborted());
        assert_eq!(result.error_message.as_deref(), Some("aborted: cancelled"));
        assert_eq!(result.attempts, 0);

        let failed = ProductionUnitResult::failed(&unit(4), "timeout", 2);
        assert!(!failed.is_aborted());
    }

    #[test]
    fn test_batch_result_from_mixed_progress() {
        let snapshot = ProgressSnapshot::from_results(vec![
            ProductionUnitResult::succeeded(&unit(0), "https://cdn/0.mp4", 58, 20, 1),
            ProductionUnitResult::failed(&unit(1), "boom", 2),
            ProductionUnitResult::succeeded(&unit(2), "https://cdn/2.mp4", 60, 20, 2),
        ]);

        let result = BatchProductionResult::from_progress(
            BatchId::from_string("b"),
            "Harbor Lights",
            snapshot,
        );
        assert!(result.success);
        assert!(result.is_partial());
        assert_eq!(result.videos.len(), 2);
        assert_eq!(result.videos[0].unit_index, 0);
        assert_eq!(result.videos[1].unit_index, 2);
        assert_eq!(result.total_duration_seconds, 118);
        assert_eq!(result.total_credits_used, 40);
    }

    #[test]
    fn test_batch_result_all_failed() {
        let snapshot =
            ProgressSnapshot::from_results(vec![ProductionUnitResult::failed(&unit(0), "boom", 2)]);
        let result =
            BatchProductionResult::from_progress(BatchId::new(), "Harbor Lights", snapshot);

        assert!(!result.success);
        assert!(result.videos.is_empty());
        assert_eq!(result.total_credits_used, 0);
    }

    #[test]
    fn test_estimate_response_shape() {
        let response = ProductionResponse::Estimate(EstimateResponse {
            success: true,
            estimated_credits: 150,
            per_unit_credits: vec![30; 5],
        });

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["estimatedCredits"], 150);
        assert!(value.get("videos").is_none());
        assert!(response.as_batch().is_none());
    }
}
