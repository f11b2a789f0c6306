//! Ledger error types.

use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The store could not be reached or answered with a server error.
    #[error("Credit store unavailable: {0}")]
    Unavailable(String),

    #[error("Insufficient credits: {required} required, {available} available")]
    InsufficientFunds { required: u32, available: u32 },

    #[error("User not found: {0}")]
    UserNotFound(String),

    /// A deduction with this reference was already applied.
    #[error("Deduction already applied for reference {0}")]
    DuplicateReference(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid credit store configuration: {0}")]
    Config(String),
}

impl LedgerError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn user_not_found(user_id: impl Into<String>) -> Self {
        Self::UserNotFound(user_id.into())
    }

    /// Transient unavailability, as opposed to a definitive answer.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, LedgerError::Unavailable(_))
    }

    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, LedgerError::InsufficientFunds { .. })
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LedgerError::InvalidResponse(err.to_string())
        } else {
            LedgerError::Unavailable(err.to_string())
        }
    }
}
