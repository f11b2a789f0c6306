//! In-memory credit store.
//!
//! Used by the CLI when `CREDIT_STORE_URL=memory` and by tests. Keeps the
//! same idempotency contract as the HTTP store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use reel_models::CreditTransaction;

use crate::error::{LedgerError, LedgerResult};
use crate::store::{CreditStore, DeductionRequest, DeductionResult};

#[derive(Default)]
struct State {
    balances: HashMap<String, u32>,
    applied: HashMap<String, DeductionResult>,
    transactions: Vec<CreditTransaction>,
}

/// Credit store backed by process memory.
#[derive(Default)]
pub struct MemoryCreditStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
    balance_calls: AtomicUsize,
    deduct_calls: AtomicUsize,
}

impl MemoryCreditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style balance seeding.
    pub fn with_balance(self, user_id: impl Into<String>, balance: u32) -> Self {
        self.set_balance(user_id, balance);
        self
    }

    pub fn set_balance(&self, user_id: impl Into<String>, balance: u32) {
        self.lock().balances.insert(user_id.into(), balance);
    }

    /// Simulate an outage: every call fails with `Unavailable` until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Balance without going through the store API (no call counted).
    pub fn balance_of(&self, user_id: &str) -> Option<u32> {
        self.lock().balances.get(user_id).copied()
    }

    /// Transactions recorded so far, oldest first.
    pub fn transactions(&self) -> Vec<CreditTransaction> {
        self.lock().transactions.clone()
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn deduct_calls(&self) -> usize {
        self.deduct_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means a panicking test; the data is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self) -> LedgerResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(LedgerError::unavailable("memory store marked unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CreditStore for MemoryCreditStore {
    async fn get_balance(&self, user_id: &str) -> LedgerResult<u32> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        self.lock()
            .balances
            .get(user_id)
            .copied()
            .ok_or_else(|| LedgerError::user_not_found(user_id))
    }

    async fn deduct(&self, request: &DeductionRequest) -> LedgerResult<DeductionResult> {
        self.deduct_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut state = self.lock();

        if let Some(existing) = state.applied.get(&request.reference_id) {
            debug!(
                reference_id = %request.reference_id,
                "Deduction already applied, returning previous result"
            );
            return Ok(existing.clone());
        }

        let available = *state
            .balances
            .get(&request.user_id)
            .ok_or_else(|| LedgerError::user_not_found(&request.user_id))?;

        if available < request.amount {
            return Err(LedgerError::InsufficientFunds {
                required: request.amount,
                available,
            });
        }

        let balance_after = available - request.amount;
        state.balances.insert(request.user_id.clone(), balance_after);

        let result = DeductionResult {
            transaction_id: Uuid::new_v4().to_string(),
            amount: request.amount,
            balance_after,
        };

        let transaction = CreditTransaction::new(
            result.transaction_id.clone(),
            request.user_id.clone(),
            request.category,
            request.amount,
            request.description.clone(),
            balance_after,
            request.reference_id.clone(),
        )
        .with_project_id(&request.project_id)
        .with_optional_metadata(request.metadata.clone());

        state.transactions.push(transaction);
        state
            .applied
            .insert(request.reference_id.clone(), result.clone());

        Ok(result)
    }
}
