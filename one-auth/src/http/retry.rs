//! Exponential backoff for transient token API failures.

use std::time::{Duration, SystemTime};

use reqwest_retry::{RetryDecision, RetryPolicy};

/// Retries with exponentially increasing delays, capped at a maximum.
pub struct RetryAfterPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryAfterPolicy {
    /// Policy starting at 500ms and capped at 10s.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }

    /// Override the first delay and the cap.
    pub fn with_bounds(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay.max(base_delay);
        self
    }

    fn delay_for(&self, n_past_retries: u32) -> Duration {
        let factor = 2_u32.saturating_pow(n_past_retries);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl RetryPolicy for RetryAfterPolicy {
    fn should_retry(&self, _request_start_time: SystemTime, n_past_retries: u32) -> RetryDecision {
        if n_past_retries >= self.max_retries {
            return RetryDecision::DoNotRetry;
        }
        RetryDecision::Retry {
            execute_after: SystemTime::now() + self.delay_for(n_past_retries),
        }
    }
}
