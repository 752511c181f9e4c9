use std::time::Duration;

use crate::llm::LlmError;

/// Classified result of a single attempt.
#[derive(Debug)]
pub enum CallOutcome {
    /// 200 with a usable envelope; carries the first choice's content.
    Success(String),
    /// 429 with a delay to honor before the next attempt. `cause` is what
    /// the call reports if no attempt is left after the wait.
    RateLimited { delay: Duration, cause: LlmError },
    /// Retryable failure, recorded as the last error.
    TransientError(LlmError),
    /// Ends the call immediately, no further attempts.
    FatalError(LlmError),
}

impl CallOutcome {
    /// A 429 whose `retry-after` named the delay.
    pub fn rate_limited(delay: Duration) -> Self {
        CallOutcome::RateLimited {
            delay,
            cause: LlmError::RateLimited { retry_after: delay },
        }
    }
}

/// Retry and timing policy for one logical call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound on network attempts per call.
    pub max_attempts: u32,
    /// Wall-clock budget shared by every attempt of a call.
    pub deadline: Duration,
    /// Back-off to use when a 429 carries no usable `retry-after`.
    /// `None` retries immediately.
    pub malformed_retry_after: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            deadline: Duration::from_secs(30),
            malformed_retry_after: None,
        }
    }
}

/// Attempt counter for a single call. The bound never changes once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    max: u32,
    remaining: u32,
}

impl RetryBudget {
    /// A budget always allows at least one attempt.
    pub fn new(max_attempts: u32) -> Self {
        let max = max_attempts.max(1);
        Self {
            max,
            remaining: max,
        }
    }

    /// Spend one attempt, returning its 1-based number.
    pub fn take(&mut self) -> Option<u32> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.max - self.remaining)
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn used(&self) -> u32 {
        self.max - self.remaining()
    }
}
