use super::FetchError;
use core::time::Duration;
use seatbelt::RecoveryInfo;

/// Bounded exponential backoff with jitter for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first attempt, so a value of 1 disables retries.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Retries allowed on top of the first attempt.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_attempts - 1
    }

    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Recovery decision for the outcome of one attempt.
    pub(crate) fn recovery<T>(outcome: &Result<T, FetchError>) -> RecoveryInfo {
        if should_retry(outcome) {
            RecoveryInfo::retry()
        } else {
            RecoveryInfo::never()
        }
    }
}

/// Only transient failures are worth another attempt.
fn should_retry<T>(outcome: &Result<T, FetchError>) -> bool {
    matches!(outcome, Err(FetchError::Transient { .. }))
}
