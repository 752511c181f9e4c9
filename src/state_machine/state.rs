use std::fmt;
use std::time::Duration;

use super::budget::{CallOutcome, RetryBudget, RetryPolicy};
use crate::llm::LlmError;
use crate::llm::deadline::Interrupted;

/// States of one logical enrichment call.
///
/// A call starts in `Attempting`, may bounce through `Waiting` after a 429,
/// and ends in `Succeeded` or `Failed`.
#[derive(Debug)]
pub enum CallState {
    Attempting {
        attempt: u32,
        last_error: Option<LlmError>,
    },
    Waiting {
        next_attempt: u32,
        delay: Duration,
        cause: LlmError,
    },
    Succeeded(String),
    Failed(LlmError),
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallState::Attempting { attempt, .. } => write!(f, "ATTEMPTING({attempt})"),
            CallState::Waiting { delay, .. } => write!(f, "WAITING({}s)", delay.as_secs()),
            CallState::Succeeded(_) => write!(f, "SUCCEEDED"),
            CallState::Failed(_) => write!(f, "FAILED"),
        }
    }
}

/// Input to the transition function.
#[derive(Debug)]
pub enum Event {
    /// An attempt finished and was classified.
    Outcome(CallOutcome),
    /// The rate-limit back-off ran to completion.
    WaitElapsed,
    /// The back-off was cut short by the deadline or by cancellation.
    Interrupted(Interrupted),
}

/// Either the final result of a call or the machine still in flight.
pub enum Resolution {
    Done(Result<String, LlmError>),
    Running(CallMachine),
}

/// Drives one call through its states. Holds no I/O; the caller performs the
/// attempt or the wait the current state asks for and feeds back an [`Event`].
#[derive(Debug)]
pub struct CallMachine {
    state: CallState,
    budget: RetryBudget,
    deadline: Duration,
}

impl CallMachine {
    pub fn new(policy: &RetryPolicy) -> Self {
        let mut budget = RetryBudget::new(policy.max_attempts);
        // RetryBudget::new always grants the first attempt.
        let attempt = budget.take().unwrap_or(1);
        Self {
            state: CallState::Attempting {
                attempt,
                last_error: None,
            },
            budget,
            deadline: policy.deadline,
        }
    }

    pub fn state(&self) -> &CallState {
        &self.state
    }

    pub fn budget(&self) -> RetryBudget {
        self.budget
    }

    /// Compute the next state from the current one and `event`.
    ///
    /// - `Attempting` + success -> `Succeeded`.
    /// - `Attempting` + transient error -> `Attempting` the next attempt, or
    ///   `Failed(RetriesExhausted)` when the budget is spent.
    /// - `Attempting` + rate limit -> `Waiting`, or `Failed(RetriesExhausted)`
    ///   when no attempt is left to wait for.
    /// - `Attempting` + fatal error -> `Failed` with that error.
    /// - `Waiting` + elapsed -> `Attempting`; + interrupted -> `Failed` with
    ///   `DeadlineExceeded` or `Cancelled`.
    /// - Terminal states ignore every event, and so do events that do not
    ///   belong to the current state.
    pub fn advance(mut self, event: Event) -> Self {
        self.state = match (self.state, event) {
            (CallState::Attempting { .. }, Event::Outcome(CallOutcome::Success(content))) => {
                CallState::Succeeded(content)
            }
            (CallState::Attempting { .. }, Event::Outcome(CallOutcome::FatalError(err))) => {
                CallState::Failed(err)
            }
            (CallState::Attempting { .. }, Event::Outcome(CallOutcome::TransientError(err))) => {
                match self.budget.take() {
                    Some(attempt) => CallState::Attempting {
                        attempt,
                        last_error: Some(err),
                    },
                    None => exhausted(self.budget, err),
                }
            }
            (
                CallState::Attempting { .. },
                Event::Outcome(CallOutcome::RateLimited { delay, cause }),
            ) => {
                match self.budget.take() {
                    Some(next_attempt) => CallState::Waiting {
                        next_attempt,
                        delay,
                        cause,
                    },
                    None => exhausted(self.budget, cause),
                }
            }
            (
                CallState::Waiting {
                    next_attempt,
                    cause,
                    ..
                },
                Event::WaitElapsed,
            ) => CallState::Attempting {
                attempt: next_attempt,
                last_error: Some(cause),
            },
            (CallState::Waiting { .. }, Event::Interrupted(Interrupted::Deadline)) => {
                CallState::Failed(LlmError::DeadlineExceeded {
                    deadline: self.deadline,
                })
            }
            (CallState::Waiting { .. }, Event::Interrupted(Interrupted::Cancelled)) => {
                CallState::Failed(LlmError::Cancelled)
            }
            (state, _) => state,
        };
        self
    }

    pub fn resolve(self) -> Resolution {
        match self.state {
            CallState::Succeeded(content) => Resolution::Done(Ok(content)),
            CallState::Failed(err) => Resolution::Done(Err(err)),
            _ => Resolution::Running(self),
        }
    }
}

fn exhausted(budget: RetryBudget, last: LlmError) -> CallState {
    CallState::Failed(LlmError::RetriesExhausted {
        attempts: budget.used(),
        last: Box::new(last),
    })
}
