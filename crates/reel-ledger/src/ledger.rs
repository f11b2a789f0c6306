//! Credit ledger: pre-flight checks, settlement and deferred reconciliation.
//!
//! A batch is charged once, after it finishes, for its successful units only.
//! When the store is unreachable at settlement time the deduction is queued
//! and applied later by [`CreditLedger::reconcile_pending`]; the batch id is
//! the idempotency key, so a deduction that did land before the outage is
//! never applied twice.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::store::{CreditStore, DeductionRequest, DeductionResult};

/// Retry policy for settlement against a flaky store.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Attempts before a deduction is deferred
    pub deduct_attempts: u32,
    /// Linear backoff step between attempts
    pub retry_base_delay: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            deduct_attempts: 3,
            retry_base_delay: Duration::from_millis(50),
        }
    }
}

/// Outcome of a pre-flight balance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceCheck {
    pub balance: u32,
    pub required: u32,
}

impl BalanceCheck {
    pub fn sufficient(&self) -> bool {
        self.balance >= self.required
    }

    pub fn shortfall(&self) -> u32 {
        self.required.saturating_sub(self.balance)
    }
}

/// A deduction waiting for the store to come back.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDeduction {
    pub request: DeductionRequest,
    pub queued_at: DateTime<Utc>,
    /// Store calls made for this deduction so far
    pub attempts: u32,
    pub last_error: String,
}

/// Result of settling a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum DeductionOutcome {
    /// The store applied the deduction now.
    Applied(DeductionResult),
    /// The store had already applied this reference.
    AlreadyApplied,
    /// The store was unreachable; the deduction is queued.
    Deferred(PendingDeduction),
    /// Nothing to charge.
    Skipped,
}

impl DeductionOutcome {
    pub fn balance_after(&self) -> Option<u32> {
        match self {
            DeductionOutcome::Applied(result) => Some(result.balance_after),
            _ => None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, DeductionOutcome::Deferred(_))
    }
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub applied: usize,
    pub still_pending: usize,
    /// Deductions the store refused definitively
    pub dropped: usize,
}

/// Queue of deferred deductions, one entry per reference.
#[derive(Debug, Default)]
pub struct DeferredDeductions {
    queue: Mutex<VecDeque<PendingDeduction>>,
}

impl DeferredDeductions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a deduction. An entry with the same reference is replaced.
    pub fn push(&self, pending: PendingDeduction) {
        let mut queue = self.lock();
        queue.retain(|p| p.request.reference_id != pending.request.reference_id);
        queue.push_back(pending);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<PendingDeduction> {
        self.lock().iter().cloned().collect()
    }

    fn drain(&self) -> Vec<PendingDeduction> {
        self.lock().drain(..).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<PendingDeduction>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Ledger front-end used by the production pipeline.
pub struct CreditLedger {
    store: Arc<dyn CreditStore>,
    config: LedgerConfig,
    deferred: DeferredDeductions,
}

impl CreditLedger {
    pub fn new(store: Arc<dyn CreditStore>) -> Self {
        Self::with_config(store, LedgerConfig::default())
    }

    pub fn with_config(store: Arc<dyn CreditStore>, config: LedgerConfig) -> Self {
        Self {
            store,
            config,
            deferred: DeferredDeductions::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn CreditStore> {
        &self.store
    }

    pub fn deferred(&self) -> &DeferredDeductions {
        &self.deferred
    }

    /// Read the balance and compare it with the amount a batch would need.
    ///
    /// Store errors are returned as-is; the caller refuses to spend when the
    /// balance cannot be read.
    pub async fn check_sufficient(
        &self,
        user_id: &str,
        required: u32,
    ) -> LedgerResult<BalanceCheck> {
        let balance = self.store.get_balance(user_id).await?;
        let check = BalanceCheck { balance, required };

        debug!(
            user_id = user_id,
            balance = balance,
            required = required,
            sufficient = check.sufficient(),
            "Pre-flight balance check"
        );

        Ok(check)
    }

    /// Charge a finished batch.
    ///
    /// Transient unavailability is retried briefly, then the deduction is
    /// deferred instead of failing. Definitive refusals are returned as errors.
    pub async fn deduct(&self, request: DeductionRequest) -> LedgerResult<DeductionOutcome> {
        if request.amount == 0 {
            debug!(reference_id = %request.reference_id, "Nothing to deduct");
            return Ok(DeductionOutcome::Skipped);
        }

        let attempts = self.config.deduct_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            match self.store.deduct(&request).await {
                Ok(result) => {
                    info!(
                        user_id = %request.user_id,
                        reference_id = %request.reference_id,
                        amount = request.amount,
                        balance_after = result.balance_after,
                        "Credits deducted"
                    );
                    return Ok(DeductionOutcome::Applied(result));
                }
                Err(LedgerError::DuplicateReference(reference)) => {
                    info!(reference_id = %reference, "Deduction already applied");
                    return Ok(DeductionOutcome::AlreadyApplied);
                }
                Err(e) if e.is_unavailable() => {
                    last_error = e.to_string();
                    if attempt + 1 < attempts {
                        warn!(
                            reference_id = %request.reference_id,
                            attempt = attempt + 1,
                            "Credit store unavailable, retrying: {}", e
                        );
                        let delay = self.config.retry_base_delay * (attempt + 1);
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            user_id = %request.user_id,
            reference_id = %request.reference_id,
            amount = request.amount,
            retries = attempts,
            "Credit store unavailable, deferring deduction"
        );

        let pending = PendingDeduction {
            request,
            queued_at: Utc::now(),
            attempts,
            last_error,
        };
        self.deferred.push(pending.clone());

        Ok(DeductionOutcome::Deferred(pending))
    }

    /// Try every deferred deduction once.
    pub async fn reconcile_pending(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for mut pending in self.deferred.drain() {
            pending.attempts += 1;
            match self.store.deduct(&pending.request).await {
                Ok(_) | Err(LedgerError::DuplicateReference(_)) => {
                    info!(
                        reference_id = %pending.request.reference_id,
                        amount = pending.request.amount,
                        "Deferred deduction applied"
                    );
                    report.applied += 1;
                }
                Err(e) if e.is_unavailable() => {
                    pending.last_error = e.to_string();
                    self.deferred.push(pending);
                    report.still_pending += 1;
                }
                Err(e) => {
                    error!(
                        user_id = %pending.request.user_id,
                        reference_id = %pending.request.reference_id,
                        amount = pending.request.amount,
                        "Deferred deduction refused by store: {}", e
                    );
                    report.dropped += 1;
                }
            }
        }

        if report != ReconcileReport::default() {
            info!(
                applied = report.applied,
                still_pending = report.still_pending,
                dropped = report.dropped,
                "Reconciliation pass finished"
            );
        }

        report
    }

    /// Run [`Self::reconcile_pending`] on an interval until shutdown is signalled.
    pub fn spawn_reconciler(
        self: Arc<Self>,
        every: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        if !self.deferred.is_empty() {
                            self.reconcile_pending().await;
                        }
                    }
                }
            }
            debug!("Reconciler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCreditStore;
    use reel_models::CreditOperationType;

    fn request(reference_id: &str, amount: u32) -> DeductionRequest {
        DeductionRequest {
            user_id: "user-1".to_string(),
            amount,
            description: "Produce 1 act of 'Night Train'".to_string(),
            project_id: "project-1".to_string(),
            category: CreditOperationType::MovieProduction,
            reference_id: reference_id.to_string(),
            metadata: None,
        }
    }

    fn ledger_with(store: Arc<MemoryCreditStore>) -> CreditLedger {
        CreditLedger::with_config(
            store,
            LedgerConfig {
                deduct_attempts: 2,
                retry_base_delay: Duration::from_millis(1),
            },
        )
    }

    #[tokio::test]
    async fn test_check_sufficient() {
        let store = Arc::new(MemoryCreditStore::new().with_balance("user-1", 40));
        let ledger = ledger_with(store);

        let check = ledger.check_sufficient("user-1", 60).await.unwrap();
        assert!(!check.sufficient());
        assert_eq!(check.shortfall(), 20);

        let check = ledger.check_sufficient("user-1", 40).await.unwrap();
        assert!(check.sufficient());
    }

    #[tokio::test]
    async fn test_zero_amount_is_skipped() {
        let store = Arc::new(MemoryCreditStore::new().with_balance("user-1", 40));
        let ledger = ledger_with(store.clone());

        let outcome = ledger.deduct(request("batch-1", 0)).await.unwrap();
        assert_eq!(outcome, DeductionOutcome::Skipped);
        assert_eq!(store.deduct_calls(), 0);
    }

    #[tokio::test]
    async fn test_deduct_applied() {
        let store = Arc::new(MemoryCreditStore::new().with_balance("user-1", 100));
        let ledger = ledger_with(store.clone());

        let outcome = ledger.deduct(request("batch-1", 25)).await.unwrap();
        assert_eq!(outcome.balance_after(), Some(75));
        assert!(ledger.deferred().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_defers_then_reconciles() {
        let store = Arc::new(MemoryCreditStore::new().with_balance("user-1", 100));
        let ledger = ledger_with(store.clone());
        store.set_unavailable(true);

        let outcome = ledger.deduct(request("batch-1", 25)).await.unwrap();
        assert!(outcome.is_deferred());
        assert_eq!(store.deduct_calls(), 2);
        assert_eq!(ledger.deferred().len(), 1);

        let report = ledger.reconcile_pending().await;
        assert_eq!(report.still_pending, 1);
        assert_eq!(store.balance_of("user-1"), Some(100));

        store.set_unavailable(false);
        let report = ledger.reconcile_pending().await;
        assert_eq!(report.applied, 1);
        assert!(ledger.deferred().is_empty());
        assert_eq!(store.balance_of("user-1"), Some(75));

        // A replay of the same batch never charges twice.
        let outcome = ledger.deduct(request("batch-1", 25)).await.unwrap();
        assert_eq!(outcome.balance_after(), Some(75));
        assert_eq!(store.transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_definitive_refusal_is_an_error() {
        let store = Arc::new(MemoryCreditStore::new().with_balance("user-1", 10));
        let ledger = ledger_with(store);

        let err = ledger.deduct(request("batch-1", 25)).await.unwrap_err();
        assert!(err.is_insufficient_funds());
        assert!(ledger.deferred().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_drops_refused_deduction() {
        let store = Arc::new(MemoryCreditStore::new().with_balance("user-1", 100));
        let ledger = ledger_with(store.clone());
        store.set_unavailable(true);
        ledger.deduct(request("batch-1", 25)).await.unwrap();

        store.set_balance("user-1", 5);
        store.set_unavailable(false);

        let report = ledger.reconcile_pending().await;
        assert_eq!(report.dropped, 1);
        assert!(ledger.deferred().is_empty());
    }

    #[test]
    fn test_deferred_queue_replaces_same_reference() {
        let queue = DeferredDeductions::new();
        let pending = |amount| PendingDeduction {
            request: request("batch-1", amount),
            queued_at: Utc::now(),
            attempts: 1,
            last_error: String::new(),
        };

        queue.push(pending(10));
        queue.push(pending(20));

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].request.amount, 20);
    }

    #[tokio::test]
    async fn test_reconciler_stops_on_shutdown() {
        let store = Arc::new(MemoryCreditStore::new().with_balance("user-1", 100));
        let ledger = Arc::new(ledger_with(store.clone()));
        store.set_unavailable(true);
        ledger.deduct(request("batch-1", 25)).await.unwrap();
        store.set_unavailable(false);

        let (tx, rx) = watch::channel(false);
        let handle = Arc::clone(&ledger).spawn_reconciler(Duration::from_millis(10), rx);

        tokio::time::timeout(Duration::from_secs(2), async {
            while !ledger.deferred().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(store.balance_of("user-1"), Some(75));
    }
}
