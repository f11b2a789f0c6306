//! Shared data models for the Reel batch production pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Series and movie production configs
//! - Production units and their results
//! - Credit estimation and credit transaction records
//! - Config validation and unit planning

pub mod batch;
pub mod config;
pub mod credit_cost;
pub mod credit_transaction;
pub mod limits;
pub mod result;
pub mod unit;
pub mod validation;

// Re-export common types
pub use batch::BatchId;
pub use config::{
    ActSpec, EpisodeSpec, MovieConfig, ProductionConfig, ProductionKind, ProductionRequest,
    ProductionSettings, SeriesConfig,
};
pub use credit_cost::{
    estimate_config, estimate_movie, estimate_series, unit_cost, CreditEstimate, CreditEstimator,
};
pub use credit_transaction::{CreditOperationType, CreditTransaction};
pub use limits::*;
pub use result::{
    BatchProductionResult, EstimateResponse, ProductionResponse, ProductionUnitResult,
    ProgressSnapshot, UnitStatus, VideoSummary, ABORTED_PREFIX,
};
pub use unit::{UnitKind, UnitSpec};
pub use validation::{
    plan_movie_units, plan_series_units, validate_movie, validate_series, ValidationError,
};
