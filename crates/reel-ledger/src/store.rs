//! Credit store abstraction.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use reel_models::CreditOperationType;

use crate::error::LedgerResult;

/// One deduction, covering a whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionRequest {
    pub user_id: String,
    pub amount: u32,
    /// Memo shown in the user's credit history
    pub description: String,
    pub project_id: String,
    pub category: CreditOperationType,
    /// Batch id; the store applies each reference at most once
    pub reference_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

/// A deduction the store has applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionResult {
    pub transaction_id: String,
    pub amount: u32,
    pub balance_after: u32,
}

/// Backend holding user balances.
///
/// `Unavailable` errors must be distinct from definitive answers such as
/// `InsufficientFunds`, so the ledger can decide whether to defer.
#[async_trait]
pub trait CreditStore: Send + Sync {
    /// Current spendable balance of a user.
    async fn get_balance(&self, user_id: &str) -> LedgerResult<u32>;

    /// Apply a deduction. Applying the same `reference_id` twice must not
    /// charge twice.
    async fn deduct(&self, request: &DeductionRequest) -> LedgerResult<DeductionResult>;
}
