use std::time::Duration;

use crate::config::RetryConfig;

/// Decision returned by the backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given delay.
    RetryAfter(Duration),
    /// Retry budget exhausted.
    GiveUp,
}

/// Linear backoff: retry `n` waits `n * base_delay`, up to `max_retries` retries.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for BackoffPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: Duration::from_millis(cfg.retry_delay_ms),
        }
    }
}

impl BackoffPolicy {
    /// `retry_count` is the number of consecutive failures so far, including
    /// the one being handled (1-based).
    pub fn decide(&self, retry_count: u32) -> RetryDecision {
        if retry_count == 0 || retry_count > self.max_retries {
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(self.base_delay.saturating_mul(retry_count))
    }
}
