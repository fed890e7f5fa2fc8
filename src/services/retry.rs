//! What the worker does with a notification the completion handler rejected.

use std::time::Duration;

use super::completion::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Deliver the notification again once `delay` has passed.
    Retry { delay: Duration },
    /// Transient failure with no attempts left: record the job as FAILED.
    Abandon,
    /// Permanent failure: acknowledge and drop.
    Drop,
}

/// Exponential backoff bounded by `max_delay`, over at most `max_attempts` deliveries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Delay before the delivery following failed `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    pub fn decide(&self, error: &PipelineError, attempt: u32) -> RetryDecision {
        if !error.is_transient() {
            return RetryDecision::Drop;
        }
        if attempt < self.max_attempts {
            RetryDecision::Retry {
                delay: self.backoff(attempt),
            }
        } else {
            RetryDecision::Abandon
        }
    }
}
