//! Pipeline configuration.

use std::time::Duration;

use crate::retry::RetryConfig;

/// Pipeline configuration.
///
/// The concurrency limit is fixed when the pipeline is built; it is not a
/// per-request setting.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum units rendering at the same time
    pub max_concurrent_units: usize,
    /// Attempts per unit, including the first
    pub unit_max_attempts: u32,
    /// Base delay for exponential backoff between attempts
    pub retry_base_delay: Duration,
    /// Upper bound on a single backoff delay
    pub retry_max_delay: Duration,
    /// Timeout for one render call
    pub unit_timeout: Duration,
    /// Deadline after which no further units are admitted
    pub batch_timeout: Duration,
    /// How often deferred deductions are replayed
    pub reconcile_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_units: 3,
            unit_max_attempts: 2,
            retry_base_delay: Duration::from_millis(2000),
            retry_max_delay: Duration::from_secs(30),
            unit_timeout: Duration::from_secs(600),
            batch_timeout: Duration::from_secs(3600), // 1 hour
            reconcile_interval: Duration::from_secs(60),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_units: env_parse("REEL_MAX_CONCURRENT_UNITS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent_units),
            unit_max_attempts: env_parse("REEL_UNIT_MAX_ATTEMPTS")
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.unit_max_attempts),
            retry_base_delay: env_parse("REEL_RETRY_BASE_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_base_delay),
            retry_max_delay: defaults.retry_max_delay,
            unit_timeout: env_parse("REEL_UNIT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.unit_timeout),
            batch_timeout: env_parse("REEL_BATCH_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.batch_timeout),
            reconcile_interval: env_parse("REEL_RECONCILE_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.reconcile_interval),
        }
    }

    /// Retry policy for unit rendering.
    pub fn unit_retry(&self) -> RetryConfig {
        RetryConfig::new("render_unit")
            .with_max_attempts(self.unit_max_attempts)
            .with_base_delay(self.retry_base_delay)
            .with_max_delay(self.retry_max_delay)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_concurrent_units, 3);
        assert_eq!(config.unit_max_attempts, 2);
        assert_eq!(config.retry_base_delay, Duration::from_secs(2));
        assert_eq!(config.batch_timeout, Duration::from_secs(3600));
    }

    #[test]
    fn test_unit_retry_policy() {
        let config = PipelineConfig {
            unit_max_attempts: 4,
            retry_base_delay: Duration::from_millis(10),
            ..PipelineConfig::default()
        };
        let retry = config.unit_retry();
        assert_eq!(retry.max_attempts, 4);
        assert_eq!(retry.base_delay, Duration::from_millis(10));
        assert_eq!(retry.operation_name, "render_unit");
    }
}
