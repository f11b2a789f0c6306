//! Prepaid credit ledger for batch productions.
//!
//! This crate provides:
//! - The [`CreditStore`] abstraction over the balance backend
//! - An HTTP store and an in-memory store
//! - [`CreditLedger`]: pre-flight balance checks, one deduction per batch,
//!   and deferred reconciliation when the store is unreachable
//!
//! # Key Features
//! - Failed units are never charged; the caller passes the settled amount
//! - The batch id is the idempotency key, so replays never double-charge
//! - An unreachable store never turns produced work into an error

pub mod error;
pub mod http;
pub mod ledger;
pub mod memory;
pub mod store;

pub use error::{LedgerError, LedgerResult};
pub use http::{HttpCreditStore, HttpCreditStoreConfig};
pub use ledger::{
    BalanceCheck, CreditLedger, DeductionOutcome, DeferredDeductions, LedgerConfig,
    PendingDeduction, ReconcileReport,
};
pub use memory::MemoryCreditStore;
pub use store::{CreditStore, DeductionRequest, DeductionResult};
