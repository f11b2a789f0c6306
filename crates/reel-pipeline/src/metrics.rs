//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; the embedding process decides
//! which recorder (if any) is installed.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    // Unit metrics
    pub const UNITS_STARTED_TOTAL: &str = "reel_units_started_total";
    pub const UNITS_SUCCEEDED_TOTAL: &str = "reel_units_succeeded_total";
    pub const UNITS_FAILED_TOTAL: &str = "reel_units_failed_total";
    pub const UNITS_RETRIED_TOTAL: &str = "reel_units_retried_total";
    pub const UNITS_ABORTED_TOTAL: &str = "reel_units_aborted_total";
    pub const UNITS_IN_FLIGHT: &str = "reel_units_in_flight";
    pub const UNIT_RENDER_SECONDS: &str = "reel_unit_render_seconds";

    // Batch metrics
    pub const BATCHES_STARTED_TOTAL: &str = "reel_batches_started_total";
    pub const BATCHES_FINISHED_TOTAL: &str = "reel_batches_finished_total";
    pub const BATCHES_REJECTED_TOTAL: &str = "reel_batches_rejected_total";

    // Credit metrics
    pub const CREDITS_CHARGED_TOTAL: &str = "reel_credits_charged_total";
    pub const CREDITS_DEFERRED_TOTAL: &str = "reel_credits_deferred_total";
}

pub fn record_unit_started(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::UNITS_STARTED_TOTAL, &labels).increment(1);
    gauge!(names::UNITS_IN_FLIGHT).increment(1.0);
}

/// Record a finished unit with its wall-clock render time.
pub fn record_unit_finished(kind: &str, succeeded: bool, duration_secs: f64) {
    let labels = [("kind", kind.to_string())];
    if succeeded {
        counter!(names::UNITS_SUCCEEDED_TOTAL, &labels).increment(1);
    } else {
        counter!(names::UNITS_FAILED_TOTAL, &labels).increment(1);
    }
    histogram!(names::UNIT_RENDER_SECONDS, &labels).record(duration_secs);
    gauge!(names::UNITS_IN_FLIGHT).decrement(1.0);
}

pub fn record_unit_retry(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::UNITS_RETRIED_TOTAL, &labels).increment(1);
}

pub fn record_units_aborted(reason: &str, count: usize) {
    let labels = [("reason", reason.to_string())];
    counter!(names::UNITS_ABORTED_TOTAL, &labels).increment(count as u64);
}

pub fn record_batch_started(production: &str) {
    let labels = [("production", production.to_string())];
    counter!(names::BATCHES_STARTED_TOTAL, &labels).increment(1);
}

/// Record a batch that reached the generation stage.
///
/// `outcome` is one of "completed", "partially_failed" or "failed".
pub fn record_batch_finished(production: &str, outcome: &str) {
    let labels = [
        ("production", production.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::BATCHES_FINISHED_TOTAL, &labels).increment(1);
}

/// Record a batch refused before generation.
pub fn record_batch_rejected(production: &str, reason: &str) {
    let labels = [
        ("production", production.to_string()),
        ("reason", reason.to_string()),
    ];
    counter!(names::BATCHES_REJECTED_TOTAL, &labels).increment(1);
}

pub fn record_credits_charged(production: &str, credits: u32) {
    let labels = [("production", production.to_string())];
    counter!(names::CREDITS_CHARGED_TOTAL, &labels).increment(u64::from(credits));
}

pub fn record_credits_deferred(production: &str, credits: u32) {
    let labels = [("production", production.to_string())];
    counter!(names::CREDITS_DEFERRED_TOTAL, &labels).increment(u64::from(credits));
}
