//! Bounded, order-preserving batch execution.
//!
//! Units are admitted to a fixed-size pool in input order. A failed unit
//! never cancels its siblings; only a fatal abort (caller cancellation, the
//! batch deadline, or running out of credits) stops admission. In-flight
//! units always run to completion and never-admitted units are reported as
//! aborted failures, so every input unit gets exactly one result.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn};

use reel_models::{
    unit_cost, BatchId, ProductionSettings, ProductionUnitResult, ProgressSnapshot, UnitSpec,
};
use reel_render_client::RenderBackend;

use crate::config::PipelineConfig;
use crate::metrics;
use crate::progress::{ProgressChannel, ProgressEvent};
use crate::unit_generator::UnitGenerator;

/// Why a batch stopped admitting units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Cancelled,
    DeadlineExceeded,
    CreditsExhausted,
}

impl AbortReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbortReason::Cancelled => "cancelled",
            AbortReason::DeadlineExceeded => "batch deadline exceeded",
            AbortReason::CreditsExhausted => "credits exhausted",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared abort signal for one batch. The first reason recorded wins.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<Option<AbortReason>>>,
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Signal an abort. Returns false if the batch was already aborted.
    pub fn abort(&self, reason: AbortReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        })
    }

    pub fn cancel(&self) -> bool {
        self.abort(AbortReason::Cancelled)
    }

    pub fn reason(&self) -> Option<AbortReason> {
        *self.tx.borrow()
    }

    pub fn is_aborted(&self) -> bool {
        self.reason().is_some()
    }

    /// Resolves once an abort has been signalled.
    pub async fn aborted(&self) -> AbortReason {
        let mut rx = self.tx.subscribe();
        let reason = match rx.wait_for(Option::is_some).await {
            Ok(value) => *value,
            Err(_) => None,
        };
        reason.unwrap_or(AbortReason::Cancelled)
    }
}

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub abort: AbortHandle,
    /// Credits available to this batch; admission stops before the planned
    /// cost of admitted units would exceed it
    pub spend_ceiling: Option<u32>,
}

/// Drives unit generation across a bounded pool.
pub struct BatchOrchestrator {
    generator: Arc<UnitGenerator>,
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    batch_timeout: Duration,
    progress: ProgressChannel,
}

impl BatchOrchestrator {
    pub fn new(
        backend: Arc<dyn RenderBackend>,
        config: &PipelineConfig,
        progress: ProgressChannel,
    ) -> Self {
        let max_concurrent = config.max_concurrent_units.max(1);
        Self {
            generator: Arc::new(UnitGenerator::new(backend, config)),
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            batch_timeout: config.batch_timeout,
            progress,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Units currently free to start.
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run every unit and return one result per unit, in input order.
    pub async fn run(
        &self,
        batch_id: &BatchId,
        units: &[UnitSpec],
        settings: &ProductionSettings,
        options: RunOptions,
    ) -> ProgressSnapshot {
        let RunOptions {
            abort,
            spend_ceiling,
        } = options;
        let deadline = tokio::time::Instant::now() + self.batch_timeout;

        self.progress.publish(ProgressEvent::BatchStarted {
            batch_id: batch_id.clone(),
            total_units: units.len(),
        });

        let mut reserved = 0u32;
        let mut handles = Vec::with_capacity(units.len());

        for unit in units {
            if abort.is_aborted() {
                break;
            }

            if let Some(ceiling) = spend_ceiling {
                let cost = unit_cost(unit.kind, unit.planned_duration_seconds);
                if reserved.saturating_add(cost) > ceiling {
                    warn!(
                        batch_id = %batch_id,
                        unit_index = unit.unit_index,
                        reserved = reserved,
                        ceiling = ceiling,
                        "Not enough credits left to admit {}", unit.display_name()
                    );
                    abort.abort(AbortReason::CreditsExhausted);
                    break;
                }
                reserved += cost;
            }

            let permit = tokio::select! {
                biased;
                _ = abort.aborted() => break,
                _ = tokio::time::sleep_until(deadline) => {
                    abort.abort(AbortReason::DeadlineExceeded);
                    break;
                }
                permit = Arc::clone(&self.semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        abort.abort(AbortReason::Cancelled);
                        break;
                    }
                },
            };

            debug!(
                batch_id = %batch_id,
                unit_index = unit.unit_index,
                "Admitting {}", unit.display_name()
            );

            let generator = Arc::clone(&self.generator);
            let progress = self.progress.clone();
            let unit = unit.clone();
            let settings = settings.clone();
            let batch_id = batch_id.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                run_unit(&generator, &unit, &settings, &batch_id, &progress).await
            }));
        }

        let admitted = handles.len();
        let mut results: Vec<Option<ProductionUnitResult>> = vec![None; units.len()];

        // Admission is in input order, so the first `admitted` slots belong to
        // the spawned tasks regardless of completion order.
        for (slot, joined) in join_all(handles).await.into_iter().enumerate() {
            results[slot] = Some(match joined {
                Ok(result) => result,
                Err(e) => {
                    warn!(
                        batch_id = %batch_id,
                        unit_index = units[slot].unit_index,
                        "Unit task did not complete: {}", e
                    );
                    ProductionUnitResult::failed(
                        &units[slot],
                        format!("unit task failed: {}", e),
                        0,
                    )
                }
            });
        }

        let not_admitted = units.len() - admitted;
        if not_admitted > 0 {
            let reason = abort.reason().unwrap_or(AbortReason::Cancelled);
            warn!(
                batch_id = %batch_id,
                not_admitted = not_admitted,
                "Batch aborted ({}), marking remaining units", reason
            );
            metrics::record_units_aborted(reason.as_str(), not_admitted);
        }

        let results: Vec<ProductionUnitResult> = results
            .into_iter()
            .zip(units)
            .map(|(slot, unit)| match slot {
                Some(result) => result,
                None => {
                    let reason = abort.reason().unwrap_or(AbortReason::Cancelled);
                    let result = ProductionUnitResult::aborted(unit, reason);
                    self.progress.publish(ProgressEvent::UnitFailed {
                        batch_id: batch_id.clone(),
                        unit_index: unit.unit_index,
                        error: result.error_message.clone().unwrap_or_default(),
                    });
                    result
                }
            })
            .collect();

        let snapshot = ProgressSnapshot::from_results(results);

        info!(
            batch_id = %batch_id,
            total = snapshot.total_units,
            completed = snapshot.completed_units,
            failed = snapshot.failed_units,
            "Batch run finished"
        );

        self.progress.publish(ProgressEvent::BatchFinished {
            batch_id: batch_id.clone(),
            completed_units: snapshot.completed_units,
            failed_units: snapshot.failed_units,
        });

        snapshot
    }
}

async fn run_unit(
    generator: &UnitGenerator,
    unit: &UnitSpec,
    settings: &ProductionSettings,
    batch_id: &BatchId,
    progress: &ProgressChannel,
) -> ProductionUnitResult {
    let kind = unit.kind.as_str();
    let started = Instant::now();

    metrics::record_unit_started(kind);
    progress.publish(ProgressEvent::UnitStarted {
        batch_id: batch_id.clone(),
        unit_index: unit.unit_index,
    });

    let result = generator.generate(unit, settings, batch_id, progress).await;

    metrics::record_unit_finished(kind, result.is_success(), started.elapsed().as_secs_f64());

    let event = match (&result.artifact_url, &result.error_message) {
        (Some(url), _) if result.is_success() => ProgressEvent::UnitSucceeded {
            batch_id: batch_id.clone(),
            unit_index: unit.unit_index,
            artifact_url: url.clone(),
            credits_charged: result.credits_charged,
        },
        (_, error) => ProgressEvent::UnitFailed {
            batch_id: batch_id.clone(),
            unit_index: unit.unit_index,
            error: error.clone().unwrap_or_default(),
        },
    };
    progress.publish(event);

    result
}
