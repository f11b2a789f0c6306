//! Credit transaction data models.
//!
//! Each deduction made for a batch is recorded as one transaction carrying
//! the batch reference, the project it belongs to and the resulting balance.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::ProductionKind;

/// Type of credit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CreditOperationType {
    /// Batch production of series episodes
    SeriesProduction,
    /// Batch production of movie acts
    MovieProduction,
    /// Manual admin adjustment (refund, correction, etc.)
    AdminAdjustment,
}

impl CreditOperationType {
    /// Returns the operation type as a string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SeriesProduction => "series_production",
            Self::MovieProduction => "movie_production",
            Self::AdminAdjustment => "admin_adjustment",
        }
    }

    /// Returns a human-readable label for the operation type.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SeriesProduction => "Series Production",
            Self::MovieProduction => "Movie Production",
            Self::AdminAdjustment => "Admin Adjustment",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "series_production" => Some(Self::SeriesProduction),
            "movie_production" => Some(Self::MovieProduction),
            "admin_adjustment" => Some(Self::AdminAdjustment),
            _ => None,
        }
    }
}

impl From<ProductionKind> for CreditOperationType {
    fn from(kind: ProductionKind) -> Self {
        match kind {
            ProductionKind::Series => Self::SeriesProduction,
            ProductionKind::Movie => Self::MovieProduction,
        }
    }
}

/// A credit transaction record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditTransaction {
    /// Unique identifier for this transaction (UUID)
    pub id: String,

    /// User who was charged
    pub user_id: String,

    /// When the transaction occurred
    pub timestamp: DateTime<Utc>,

    /// Type of operation that consumed credits
    pub operation_type: CreditOperationType,

    /// Number of credits charged
    pub credits_amount: u32,

    /// Human-readable description of the operation
    pub description: String,

    /// Balance remaining after this transaction
    pub balance_after: u32,

    /// Batch the credits were charged for (idempotency key)
    pub reference_id: String,

    /// Associated project ID (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Additional metadata (e.g., unit breakdown)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl CreditTransaction {
    /// Create a new credit transaction.
    pub fn new(
        id: String,
        user_id: String,
        operation_type: CreditOperationType,
        credits_amount: u32,
        description: String,
        balance_after: u32,
        reference_id: String,
    ) -> Self {
        Self {
            id,
            user_id,
            timestamp: Utc::now(),
            operation_type,
            credits_amount,
            description,
            balance_after,
            reference_id,
            project_id: None,
            metadata: None,
        }
    }

    /// Set the project ID.
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Set metadata if Some, otherwise no-op.
    pub fn with_optional_metadata(mut self, metadata: Option<HashMap<String, String>>) -> Self {
        if let Some(meta) = metadata {
            self.metadata = Some(meta);
        }
        self
    }
}
