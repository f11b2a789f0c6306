//! Single-unit generation.
//!
//! Wraps a render backend with a per-call timeout and the retry policy, and
//! turns every outcome into a `ProductionUnitResult`. Errors never escape
//! this boundary, so one unit can not take its siblings down with it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use reel_models::{unit_cost, BatchId, ProductionSettings, ProductionUnitResult, UnitSpec};
use reel_render_client::{
    RenderBackend, RenderError, RenderRequest, RenderResult, RenderedArtifact,
};

use crate::config::PipelineConfig;
use crate::metrics;
use crate::progress::{ProgressChannel, ProgressEvent};
use crate::retry::{retry_async, RetryConfig, RetryOutcome};

/// Generates one unit at a time against a render backend.
pub struct UnitGenerator {
    backend: Arc<dyn RenderBackend>,
    retry: RetryConfig,
    unit_timeout: Duration,
}

impl UnitGenerator {
    pub fn new(backend: Arc<dyn RenderBackend>, config: &PipelineConfig) -> Self {
        Self {
            backend,
            retry: config.unit_retry(),
            unit_timeout: config.unit_timeout,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Render one unit.
    ///
    /// Never fails: a unit that could not be produced comes back as a
    /// `Failed` result carrying the last error and the attempts made.
    pub async fn generate(
        &self,
        unit: &UnitSpec,
        settings: &ProductionSettings,
        batch_id: &BatchId,
        progress: &ProgressChannel,
    ) -> ProductionUnitResult {
        let request = RenderRequest::for_unit(unit, settings, batch_id.as_str());

        debug!(
            batch_id = %batch_id,
            unit_index = unit.unit_index,
            backend = self.backend.name(),
            "Rendering {}", unit.display_name()
        );

        let outcome = retry_async(
            &self.retry,
            || self.render_once(&request),
            |attempt, error: &RenderError, delay| {
                warn!(
                    batch_id = %batch_id,
                    unit_index = unit.unit_index,
                    attempt = attempt,
                    "Retrying {} in {:?}: {}", unit.display_name(), delay, error
                );
                metrics::record_unit_retry(unit.kind.as_str());
                progress.publish(ProgressEvent::UnitRetrying {
                    batch_id: batch_id.clone(),
                    unit_index: unit.unit_index,
                    attempt,
                    error: error.to_string(),
                });
            },
        )
        .await;

        match outcome {
            RetryOutcome::Success { value, attempts } => {
                let credits = charge_for(unit, &value);
                info!(
                    batch_id = %batch_id,
                    unit_index = unit.unit_index,
                    attempts = attempts,
                    duration_seconds = value.duration_seconds,
                    credits = credits,
                    "Rendered {}", unit.display_name()
                );
                ProductionUnitResult::succeeded(
                    unit,
                    value.url,
                    value.duration_seconds,
                    credits,
                    attempts,
                )
            }
            RetryOutcome::Failed { error, attempts } => {
                warn!(
                    batch_id = %batch_id,
                    unit_index = unit.unit_index,
                    attempts = attempts,
                    retryable = error.is_retryable(),
                    "Failed to render {}: {}", unit.display_name(), error
                );
                ProductionUnitResult::failed(unit, error.to_string(), attempts)
            }
        }
    }

    async fn render_once(&self, request: &RenderRequest) -> RenderResult<RenderedArtifact> {
        match tokio::time::timeout(self.unit_timeout, self.backend.render(request)).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::Timeout(self.unit_timeout.as_secs())),
        }
    }
}

/// Credits owed for a rendered unit, capped at its estimated cost.
pub fn charge_for(unit: &UnitSpec, artifact: &RenderedArtifact) -> u32 {
    let planned = unit_cost(unit.kind, unit.planned_duration_seconds);
    let actual = unit_cost(unit.kind, artifact.duration_seconds);
    actual.min(planned)
}
