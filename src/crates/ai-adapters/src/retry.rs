use crate::client::InvocationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// `multiplier * 2^(attempt-1)` clamped to `[min, max]`.
    Exponential,
    /// Always `min`.
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryCondition {
    /// Only 503 responses.
    Unavailable,
    /// 503, 429, other 5xx and transport failures. Never timeouts.
    Transient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub multiplier_ms: u64,
    pub min_wait_ms: u64,
    pub max_wait_ms: u64,
    pub retry_on: RetryCondition,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::extraction_standard()
    }
}

impl RetryPolicy {
    pub fn extraction_standard() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential,
            multiplier_ms: 1_000,
            min_wait_ms: 2_000,
            max_wait_ms: 10_000,
            retry_on: RetryCondition::Unavailable,
        }
    }

    pub fn extraction_extended() -> Self {
        Self {
            max_attempts: 6,
            backoff: Backoff::Exponential,
            multiplier_ms: 2_000,
            min_wait_ms: 5_000,
            max_wait_ms: 60_000,
            retry_on: RetryCondition::Unavailable,
        }
    }

    pub fn generation() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Fixed,
            multiplier_ms: 0,
            min_wait_ms: 5_000,
            max_wait_ms: 5_000,
            retry_on: RetryCondition::Transient,
        }
    }

    /// Same attempts and condition with every wait set to zero.
    pub fn without_delay(mut self) -> Self {
        self.multiplier_ms = 0;
        self.min_wait_ms = 0;
        self.max_wait_ms = 0;
        self
    }

    /// Wait after the given failed attempt (1-based).
    pub fn wait_for(&self, attempt: u32) -> Duration {
        let ms = match self.backoff {
            Backoff::Fixed => self.min_wait_ms,
            Backoff::Exponential => {
                let exp = attempt.saturating_sub(1).min(32);
                let raw = self.multiplier_ms.saturating_mul(1u64 << exp);
                raw.clamp(self.min_wait_ms, self.max_wait_ms.max(self.min_wait_ms))
            }
        };
        Duration::from_millis(ms)
    }

    pub fn should_retry(&self, error: &InvocationError, attempt: u32) -> bool {
        if attempt >= self.max_attempts.max(1) {
            return false;
        }
        match self.retry_on {
            RetryCondition::Unavailable => error.is_unavailable(),
            RetryCondition::Transient => error.is_transient(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_waits_are_clamped() {
        let policy = RetryPolicy::extraction_standard();
        assert_eq!(policy.wait_for(1), Duration::from_secs(2));
        assert_eq!(policy.wait_for(2), Duration::from_secs(2));
        assert_eq!(policy.wait_for(3), Duration::from_secs(4));
        assert_eq!(policy.wait_for(4), Duration::from_secs(8));
        assert_eq!(policy.wait_for(5), Duration::from_secs(10));

        let extended = RetryPolicy::extraction_extended();
        assert_eq!(extended.wait_for(1), Duration::from_secs(5));
        assert_eq!(extended.wait_for(3), Duration::from_secs(8));
        assert_eq!(extended.wait_for(6), Duration::from_secs(60));
    }

    #[test]
    fn fixed_wait_ignores_attempt() {
        let policy = RetryPolicy::generation();
        assert_eq!(policy.wait_for(1), Duration::from_secs(5));
        assert_eq!(policy.wait_for(3), Duration::from_secs(5));
    }

    #[test]
    fn retry_condition_limits_what_is_retried() {
        let unavailable = InvocationError::Unavailable { body: String::new() };
        let timeout = InvocationError::Timeout(300);

        let extraction = RetryPolicy::extraction_standard();
        assert!(extraction.should_retry(&unavailable, 1));
        assert!(!extraction.should_retry(&timeout, 1));
        assert!(!extraction.should_retry(&unavailable, 3));

        let generation = RetryPolicy::generation();
        let server_error = InvocationError::Status {
            status: 500,
            body: String::new(),
        };
        assert!(generation.should_retry(&server_error, 2));
        assert!(!generation.should_retry(&server_error, 3));
        assert!(!generation.should_retry(&timeout, 1));
    }

    #[test]
    fn without_delay_keeps_attempts() {
        let policy = RetryPolicy::extraction_extended().without_delay();
        assert_eq!(policy.max_attempts, 6);
        assert_eq!(policy.wait_for(4), Duration::ZERO);
    }
}
