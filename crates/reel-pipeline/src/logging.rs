//! Structured batch logging utilities.
//!
//! Provides consistent, structured logging for batch processing with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};

use reel_models::BatchId;

use crate::controller::ProductionStage;

/// Batch logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct BatchLogger {
    batch_id: String,
    production: String,
}

impl BatchLogger {
    /// Create a logger for one batch.
    ///
    /// # Arguments
    /// * `batch_id` - The batch being produced
    /// * `production` - Kind of production ("series" or "movie")
    pub fn new(batch_id: &BatchId, production: &str) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            production: production.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            batch_id = %self.batch_id,
            production = %self.production,
            "Batch started: {}", message
        );
    }

    /// Log a state machine transition.
    pub fn log_stage(&self, stage: ProductionStage) {
        info!(
            batch_id = %self.batch_id,
            production = %self.production,
            stage = stage.as_str(),
            "Batch stage: {}", stage
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            batch_id = %self.batch_id,
            production = %self.production,
            "Batch progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            batch_id = %self.batch_id,
            production = %self.production,
            "Batch warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            batch_id = %self.batch_id,
            production = %self.production,
            "Batch error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            batch_id = %self.batch_id,
            production = %self.production,
            "Batch completed: {}", message
        );
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn production(&self) -> &str {
        &self.production
    }

    /// Span covering the whole batch, for attaching unit-level events.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "batch",
            batch_id = %self.batch_id,
            production = %self.production
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_logger_creation() {
        let batch_id = BatchId::new();
        let logger = BatchLogger::new(&batch_id, "series");

        assert_eq!(logger.batch_id(), batch_id.to_string());
        assert_eq!(logger.production(), "series");
    }

    #[test]
    fn test_logging_without_subscriber() {
        let logger = BatchLogger::new(&BatchId::from_string("batch-1"), "movie");
        logger.log_start("3 acts");
        logger.log_stage(ProductionStage::Generating);
        logger.log_completion("done");
        let _span = logger.create_span();
    }
}
