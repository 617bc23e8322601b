use std::time::Duration;

/// Timing for the change-feed poll loop.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Pause between successful poll cycles.
    pub poll_interval: Duration,
    /// Pause after a failed cycle (connection or query error).
    pub error_backoff: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5000),
            error_backoff: Duration::from_millis(10_000),
        }
    }
}
