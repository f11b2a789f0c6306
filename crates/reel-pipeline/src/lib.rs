//! Batch production pipeline for series and movies.
//!
//! This crate provides:
//! - `UnitGenerator`: one unit per call, with timeout and retry
//! - `BatchOrchestrator`: bounded, order-preserving execution with abort
//! - `ProductionController`: validation, pre-flight credit check,
//!   generation and a single post-run deduction per batch
//!
//! # Key Features
//! - Continue-on-error: a failed unit never cancels its siblings
//! - Failed units are never charged and no unit costs more than its estimate
//! - A ledger outage defers billing instead of discarding produced work

pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod progress;
pub mod retry;
pub mod unit_generator;

pub use config::PipelineConfig;
pub use controller::{
    ProductionController, ProductionStage, DEDUCTION_DELAYED_PREFIX, DEDUCTION_UNSETTLED_PREFIX,
};
pub use error::{ProductionError, ProductionResult};
pub use logging::BatchLogger;
pub use orchestrator::{AbortHandle, AbortReason, BatchOrchestrator, RunOptions};
pub use progress::{ProgressChannel, ProgressEvent};
pub use retry::{retry_async, RetryConfig, RetryOutcome, Retryable};
pub use unit_generator::{charge_for, UnitGenerator};
