//! Error taxonomy for the enrichment API caller.
//!
//! Attempt-level variants ([`Transport`](LlmError::Transport),
//! [`Decode`](LlmError::Decode), [`RateLimited`](LlmError::RateLimited),
//! [`RateLimitHeaderMalformed`](LlmError::RateLimitHeaderMalformed),
//! [`UnexpectedStatus`](LlmError::UnexpectedStatus)) are retried and only ever
//! reach the caller wrapped inside [`RetriesExhausted`](LlmError::RetriesExhausted).
//! The remaining variants are terminal.

use std::time::Duration;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum LlmError {
    /// The request body could not be serialized. Never retried.
    #[error("failed to build request payload: {0}")]
    Payload(#[source] serde_json::Error),

    /// Network-level failure while issuing the request or reading the body.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// A 200 response that did not carry a usable envelope.
    #[error("failed to decode API response: {0}")]
    Decode(String),

    /// HTTP 429 with a usable `retry-after` delay.
    #[error("rate limited, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// HTTP 429 whose `retry-after` header was missing or not an integer.
    #[error(
        "rate limited with unusable retry-after header: {}",
        .header.as_deref().unwrap_or("<missing>")
    )]
    RateLimitHeaderMalformed { header: Option<String> },

    /// Any status other than 200 and 429.
    #[error("unexpected status code {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The shared deadline elapsed while waiting out a rate-limit delay.
    #[error("deadline of {}s exceeded while waiting out rate limit", .deadline.as_secs())]
    DeadlineExceeded { deadline: Duration },

    /// The call was cancelled from outside (shutdown) before it completed.
    #[error("call cancelled")]
    Cancelled,

    /// Every attempt failed; `last` is the most recent attempt-level error.
    #[error("max retries ({attempts}) exceeded, last error: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<LlmError>,
    },
}

impl LlmError {
    pub fn transport(err: impl Into<BoxError>) -> Self {
        LlmError::Transport(err.into())
    }

    /// True for errors that end the call without consuming further attempts.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LlmError::Payload(_)
                | LlmError::DeadlineExceeded { .. }
                | LlmError::Cancelled
                | LlmError::RetriesExhausted { .. }
        )
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Transport(Box::new(err))
    }
}
