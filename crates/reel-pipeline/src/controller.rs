//! Request-level production flow.
//!
//! Two error lanes:
//! - fail fast: validation, insufficient credits and an unreadable balance
//!   are returned as `Err` before anything is spent
//! - degrade: unit failures and ledger outages after generation are folded
//!   into the `BatchProductionResult`, which is always returned

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use reel_ledger::{CreditLedger, DeductionOutcome, DeductionRequest, ReconcileReport};
use reel_models::{
    plan_movie_units, plan_series_units, validate_movie, validate_series, BatchId,
    BatchProductionResult, CreditEstimate, CreditEstimator, CreditOperationType, EstimateResponse,
    ProductionConfig, ProductionKind, ProductionRequest, ProductionResponse, UnitKind, UnitSpec,
};
use reel_render_client::RenderBackend;

use crate::config::PipelineConfig;
use crate::error::{ProductionError, ProductionResult};
use crate::logging::BatchLogger;
use crate::metrics;
use crate::orchestrator::{AbortHandle, BatchOrchestrator, RunOptions};
use crate::progress::ProgressChannel;

/// Prefix of the note attached when billing is postponed.
pub const DEDUCTION_DELAYED_PREFIX: &str = "Credits deduction delayed";

/// Prefix of the note left when a deferred deduction is still queued and
/// nothing will replay it.
pub const DEDUCTION_UNSETTLED_PREFIX: &str = "Credits deduction unsettled";

/// States a production request moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductionStage {
    Validating,
    EstimateOnly,
    CheckingCredits,
    Insufficient,
    Generating,
    Reconciling,
    Completed,
    PartiallyFailed,
    Failed,
}

impl ProductionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionStage::Validating => "validating",
            ProductionStage::EstimateOnly => "estimate_only",
            ProductionStage::CheckingCredits => "checking_credits",
            ProductionStage::Insufficient => "insufficient",
            ProductionStage::Generating => "generating",
            ProductionStage::Reconciling => "reconciling",
            ProductionStage::Completed => "completed",
            ProductionStage::PartiallyFailed => "partially_failed",
            ProductionStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProductionStage::EstimateOnly
                | ProductionStage::Insufficient
                | ProductionStage::Completed
                | ProductionStage::PartiallyFailed
                | ProductionStage::Failed
        )
    }
}

impl fmt::Display for ProductionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Entry point for series and movie productions.
pub struct ProductionController {
    orchestrator: BatchOrchestrator,
    ledger: Arc<CreditLedger>,
    progress: ProgressChannel,
    config: PipelineConfig,
}

impl ProductionController {
    pub fn new(
        backend: Arc<dyn RenderBackend>,
        ledger: Arc<CreditLedger>,
        config: PipelineConfig,
    ) -> Self {
        let progress = ProgressChannel::default();
        Self {
            orchestrator: BatchOrchestrator::new(backend, &config, progress.clone()),
            ledger,
            progress,
            config,
        }
    }

    pub fn progress(&self) -> &ProgressChannel {
        &self.progress
    }

    pub fn ledger(&self) -> &Arc<CreditLedger> {
        &self.ledger
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Replay deferred deductions every `reconcile_interval` until shutdown.
    pub fn spawn_reconciler(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        Arc::clone(&self.ledger).spawn_reconciler(self.config.reconcile_interval, shutdown)
    }

    /// Run one reconciliation pass and fold its result into `response`.
    ///
    /// For hosts that exit after a single request instead of keeping the
    /// reconciler running. A settled deduction clears the delayed note and
    /// fills in the remaining balance; one still queued is reported as
    /// unsettled.
    pub async fn settle_deferred(&self, response: &mut ProductionResponse) -> ReconcileReport {
        let result = match response {
            ProductionResponse::Completed(result) => result,
            ProductionResponse::Estimate(_) => return ReconcileReport::default(),
        };
        let reference = result.batch_id.to_string();
        let pending = match self
            .ledger
            .deferred()
            .snapshot()
            .into_iter()
            .find(|p| p.request.reference_id == reference)
        {
            Some(pending) => pending,
            None => return ReconcileReport::default(),
        };

        let report = self.ledger.reconcile_pending().await;
        let still_queued = self
            .ledger
            .deferred()
            .snapshot()
            .iter()
            .any(|p| p.request.reference_id == reference);

        if still_queued {
            result.error = Some(format!(
                "{}: {} credits could not be charged before exit",
                DEDUCTION_UNSETTLED_PREFIX, pending.request.amount
            ));
        } else if report.applied == 0 && report.dropped > 0 {
            result.error = Some(format!(
                "Credits deduction failed: {} credits refused by the credit store",
                pending.request.amount
            ));
        } else {
            result.error = None;
            result.credits_remaining = self
                .ledger
                .store()
                .get_balance(&pending.request.user_id)
                .await
                .ok();
        }

        report
    }

    /// Produce a series or a movie, depending on the request.
    pub async fn produce(
        &self,
        request: ProductionRequest,
    ) -> ProductionResult<ProductionResponse> {
        self.produce_with_abort(request, AbortHandle::new()).await
    }

    pub async fn produce_series(
        &self,
        request: ProductionRequest,
    ) -> ProductionResult<ProductionResponse> {
        expect_kind(&request, ProductionKind::Series)?;
        self.produce(request).await
    }

    pub async fn produce_movie(
        &self,
        request: ProductionRequest,
    ) -> ProductionResult<ProductionResponse> {
        expect_kind(&request, ProductionKind::Movie)?;
        self.produce(request).await
    }

    /// Produce with a caller-controlled abort signal.
    ///
    /// Aborting stops admission of further units; units already rendering
    /// finish and are billed normally.
    pub async fn produce_with_abort(
        &self,
        request: ProductionRequest,
        abort: AbortHandle,
    ) -> ProductionResult<ProductionResponse> {
        let batch_id = BatchId::new();
        let logger = BatchLogger::new(&batch_id, request.kind().as_str());
        let span = logger.create_span();

        self.run(batch_id, request, abort, logger).instrument(span).await
    }

    async fn run(
        &self,
        batch_id: BatchId,
        request: ProductionRequest,
        abort: AbortHandle,
        logger: BatchLogger,
    ) -> ProductionResult<ProductionResponse> {
        let production = request.kind().as_str();

        logger.log_stage(ProductionStage::Validating);
        let units = match plan(&request.config) {
            Ok(units) => units,
            Err(e) => {
                logger.log_warning(&e.to_string());
                metrics::record_batch_rejected(production, e.kind());
                return Err(e);
            }
        };
        let estimate = CreditEstimator::new(&units).estimate();

        if request.settings.estimate_only {
            logger.log_stage(ProductionStage::EstimateOnly);
            return Ok(ProductionResponse::Estimate(EstimateResponse {
                success: true,
                estimated_credits: estimate.total,
                per_unit_credits: estimate.per_unit,
            }));
        }

        logger.log_stage(ProductionStage::CheckingCredits);
        let check = match self
            .ledger
            .check_sufficient(&request.user_id, estimate.total)
            .await
        {
            Ok(check) => check,
            Err(e) => {
                let err = ProductionError::from(e);
                logger.log_error(&format!("balance check failed: {}", err));
                metrics::record_batch_rejected(production, err.kind());
                return Err(err);
            }
        };

        if !check.sufficient() {
            logger.log_stage(ProductionStage::Insufficient);
            metrics::record_batch_rejected(production, "insufficient_credits");
            return Err(ProductionError::InsufficientCredits {
                required: check.required,
                available: check.balance,
            });
        }

        logger.log_stage(ProductionStage::Generating);
        logger.log_start(&format!(
            "{} units of '{}', estimated {} credits",
            units.len(),
            request.config.title(),
            estimate.total
        ));
        metrics::record_batch_started(production);

        let progress = self
            .orchestrator
            .run(
                &batch_id,
                &units,
                &request.settings,
                RunOptions {
                    abort,
                    spend_ceiling: Some(check.balance),
                },
            )
            .await;

        let mut result =
            BatchProductionResult::from_progress(batch_id, request.config.title(), progress);
        debug_assert!(result.total_credits_used <= estimate.total);

        if !result.success {
            // Nothing was produced, so nothing is charged.
            logger.log_stage(ProductionStage::Failed);
            result.credits_remaining = Some(check.balance);
            result.error = Some(all_failed_message(&result));
            logger.log_error(result.error.as_deref().unwrap_or_default());
            metrics::record_batch_finished(production, ProductionStage::Failed.as_str());
            return Ok(ProductionResponse::Completed(result));
        }

        logger.log_stage(ProductionStage::Reconciling);
        let deduction = deduction_for(&request, &units, &result);
        let amount = deduction.amount;

        match self.ledger.deduct(deduction).await {
            Ok(DeductionOutcome::Applied(applied)) => {
                result.credits_remaining = Some(applied.balance_after);
                metrics::record_credits_charged(production, amount);
            }
            Ok(DeductionOutcome::AlreadyApplied) => {
                logger.log_warning("deduction for this batch was already applied");
            }
            Ok(DeductionOutcome::Skipped) => {
                result.credits_remaining = Some(check.balance);
            }
            Ok(DeductionOutcome::Deferred(pending)) => {
                logger.log_warning(&format!(
                    "credit store unavailable, {} credits deferred",
                    amount
                ));
                metrics::record_credits_deferred(production, amount);
                result.error = Some(format!(
                    "{}: {} credits will be charged once the credit store is reachable ({})",
                    DEDUCTION_DELAYED_PREFIX, amount, pending.last_error
                ));
            }
            Err(e) => {
                // Produced artifacts are returned even when billing is refused.
                logger.log_error(&format!("credit deduction refused: {}", e));
                result.error = Some(format!("Credits deduction failed: {}", e));
            }
        }

        let stage = if result.is_partial() {
            ProductionStage::PartiallyFailed
        } else {
            ProductionStage::Completed
        };
        logger.log_stage(stage);
        logger.log_completion(&format!(
            "{}/{} units, {} credits",
            result.progress.completed_units, result.progress.total_units, result.total_credits_used
        ));
        metrics::record_batch_finished(production, stage.as_str());

        Ok(ProductionResponse::Completed(result))
    }
}

fn expect_kind(request: &ProductionRequest, expected: ProductionKind) -> ProductionResult<()> {
    if request.kind() == expected {
        Ok(())
    } else {
        Err(ProductionError::validation(
            "kind",
            format!("expected {}, got {}", expected, request.kind()),
        ))
    }
}

/// Validate the config and plan its units.
fn plan(config: &ProductionConfig) -> ProductionResult<Vec<UnitSpec>> {
    match config {
        ProductionConfig::Series(series) => {
            validate_series(series)?;
            Ok(plan_series_units(series))
        }
        ProductionConfig::Movie(movie) => {
            validate_movie(movie)?;
            Ok(plan_movie_units(movie))
        }
    }
}

fn unit_kind_for(kind: ProductionKind) -> UnitKind {
    match kind {
        ProductionKind::Series => UnitKind::Episode,
        ProductionKind::Movie => UnitKind::Act,
    }
}

/// One deduction covering the successful units of the batch.
fn deduction_for(
    request: &ProductionRequest,
    units: &[UnitSpec],
    result: &BatchProductionResult,
) -> DeductionRequest {
    let charged = CreditEstimate {
        per_unit: result.videos.iter().map(|v| v.credits_charged).collect(),
        total: result.total_credits_used,
    };

    let mut metadata = charged.to_metadata();
    metadata.insert("batch_id".to_string(), result.batch_id.to_string());
    metadata.insert("planned_units".to_string(), units.len().to_string());
    metadata.insert(
        "failed_units".to_string(),
        result.progress.failed_units.to_string(),
    );

    DeductionRequest {
        user_id: request.user_id.clone(),
        amount: result.total_credits_used,
        description: charged.to_description(unit_kind_for(request.kind()), &result.title),
        project_id: request.project_id.clone(),
        category: CreditOperationType::from(request.kind()),
        reference_id: result.batch_id.to_string(),
        metadata: Some(metadata),
    }
}

fn all_failed_message(result: &BatchProductionResult) -> String {
    let first_error = result
        .progress
        .unit_results
        .iter()
        .find_map(|r| r.error_message.as_deref());

    match first_error {
        Some(error) => format!(
            "All {} units failed; first error: {}",
            result.progress.total_units, error
        ),
        None => format!("All {} units failed", result.progress.total_units),
    }
}
