use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;

/// Why a wait or request ended before it completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// The wall-clock cutoff passed.
    Deadline,
    /// The token (or its parent) was cancelled from outside.
    Cancelled,
}

/// Wall-clock cutoff shared by every attempt of one logical call.
///
/// Owns a cancellation token created at call start. Waits and in-flight
/// requests race against both the cutoff and the token; the token wins ties.
#[derive(Debug)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
    token: CancellationToken,
}

impl Deadline {
    /// Deadline whose token is a child of `parent`, so cancelling the parent
    /// interrupts this call too.
    pub fn child_of(budget: Duration, parent: &CancellationToken) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
            token: parent.child_token(),
        }
    }

    /// The full budget this deadline was created with.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn check(&self) -> Result<(), Interrupted> {
        if self.token.is_cancelled() {
            Err(Interrupted::Cancelled)
        } else if Instant::now() >= self.at {
            Err(Interrupted::Deadline)
        } else {
            Ok(())
        }
    }

    /// Resolves once the cutoff passes or the token is cancelled.
    pub async fn interrupted(&self) -> Interrupted {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Interrupted::Cancelled,
            _ = sleep_until(self.at) => Interrupted::Deadline,
        }
    }

    /// Sleep for `delay`, returning early if the deadline is reached first.
    pub async fn sleep(&self, delay: Duration) -> Result<(), Interrupted> {
        tokio::select! {
            biased;
            reason = self.interrupted() => Err(reason),
            _ = sleep(delay) => Ok(()),
        }
    }

    /// Drive `fut` to completion unless the deadline is reached first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        tokio::select! {
            biased;
            reason = self.interrupted() => Err(reason),
            out = fut => Ok(out),
        }
    }
}
