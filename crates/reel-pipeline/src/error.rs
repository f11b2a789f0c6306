//! Pipeline error types.
//!
//! Only fail-fast conditions are errors here. Unit failures are recorded in
//! the batch result and ledger outages take the deferred path, so neither
//! ever reaches the caller as an `Err`.

use thiserror::Error;

use reel_ledger::LedgerError;
use reel_models::ValidationError;

/// Result type for pipeline operations.
pub type ProductionResult<T> = Result<T, ProductionError>;

/// Errors that stop a request before any credits are spent.
#[derive(Debug, Error)]
pub enum ProductionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Insufficient credits: {required} required, {available} available")]
    InsufficientCredits { required: u32, available: u32 },

    /// The balance could not be read during the pre-flight check.
    #[error("Credit ledger error: {0}")]
    Ledger(LedgerError),

    /// A client could not be built from its settings.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<LedgerError> for ProductionError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Config(msg) => ProductionError::Config(msg),
            other => ProductionError::Ledger(other),
        }
    }
}

impl ProductionError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(field, reason))
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// HTTP status a front-end should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            ProductionError::Validation(_) => 400,
            ProductionError::InsufficientCredits { .. } => 402,
            ProductionError::Ledger(e) if e.is_unavailable() => 503,
            ProductionError::Ledger(_) | ProductionError::Config(_) => 500,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProductionError::Validation(_) => "validation",
            ProductionError::InsufficientCredits { .. } => "insufficient_credits",
            ProductionError::Ledger(_) => "ledger",
            ProductionError::Config(_) => "config",
        }
    }
}
