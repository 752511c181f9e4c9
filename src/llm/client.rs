use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::deadline::Deadline;
use super::error::LlmError;
use super::transport::{HttpReply, HttpTransport, Transport};
use super::types::{ChatRequest, ChatResponse};
use crate::state_machine::{CallMachine, CallOutcome, CallState, Event, Resolution, RetryPolicy};

/// Calls the enrichment endpoint, retrying transient failures and honoring
/// `retry-after` on 429 within a single shared deadline.
pub struct RateLimitedCaller<T = HttpTransport> {
    transport: T,
    endpoint: String,
    token: String,
    policy: RetryPolicy,
}

impl RateLimitedCaller<HttpTransport> {
    pub fn new(
        endpoint: String,
        token: String,
        policy: RetryPolicy,
        http_timeout: Duration,
    ) -> Result<Self, LlmError> {
        let transport = HttpTransport::new(http_timeout)?;
        Ok(Self::with_transport(transport, endpoint, token, policy))
    }
}

impl<T: Transport> RateLimitedCaller<T> {
    pub fn with_transport(
        transport: T,
        endpoint: String,
        token: String,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            endpoint,
            token,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `user_text` under `system_prompt` to `model` and return the first
    /// choice's content.
    pub async fn complete(
        &self,
        model: &str,
        system_prompt: &str,
        user_text: &str,
        shutdown: &CancellationToken,
    ) -> Result<String, LlmError> {
        self.call(&ChatRequest::new(model, system_prompt, user_text), shutdown)
            .await
    }

    /// Run one logical call with an arbitrary JSON body.
    ///
    /// Serialization happens before any network attempt; a failure there is
    /// returned as [`LlmError::Payload`] without touching the transport.
    pub async fn call<B: Serialize + ?Sized>(
        &self,
        body: &B,
        shutdown: &CancellationToken,
    ) -> Result<String, LlmError> {
        let payload = encode_payload(body)?;
        let deadline = Deadline::child_of(self.policy.deadline, shutdown);
        let mut machine = CallMachine::new(&self.policy);

        loop {
            machine = match machine.resolve() {
                Resolution::Done(result) => return result,
                Resolution::Running(machine) => machine,
            };

            let event = match *machine.state() {
                CallState::Attempting {
                    attempt,
                    ref last_error,
                } => {
                    if let Some(err) = last_error {
                        debug!(attempt, last_error = %err, "retrying enrichment call");
                    }
                    Event::Outcome(self.attempt(attempt, &payload, &deadline).await)
                }
                CallState::Waiting {
                    next_attempt,
                    delay,
                    ..
                } => {
                    info!(
                        delay_secs = delay.as_secs(),
                        next_attempt,
                        max_attempts = machine.budget().max(),
                        "rate limited, waiting before retrying"
                    );
                    match deadline.sleep(delay).await {
                        Ok(()) => Event::WaitElapsed,
                        Err(reason) => Event::Interrupted(reason),
                    }
                }
                CallState::Succeeded(_) | CallState::Failed(_) => continue,
            };
            machine = machine.advance(event);
        }
    }

    async fn attempt(&self, attempt: u32, payload: &[u8], deadline: &Deadline) -> CallOutcome {
        debug!(attempt, endpoint = %self.endpoint, "sending enrichment request");

        let outcome = match self
            .transport
            .post(&self.endpoint, &self.token, payload, deadline)
            .await
        {
            Ok(reply) => classify(reply, self.policy.malformed_retry_after),
            Err(err) if err.is_terminal() => CallOutcome::FatalError(err),
            Err(err) => CallOutcome::TransientError(err),
        };

        if let CallOutcome::TransientError(err) = &outcome {
            warn!(
                attempt,
                max_attempts = self.policy.max_attempts,
                error = %err,
                "enrichment attempt failed"
            );
        }
        outcome
    }
}

/// Serialize a request body. The only error path is a body serde cannot
/// express as JSON.
pub fn encode_payload<B: Serialize + ?Sized>(body: &B) -> Result<Vec<u8>, LlmError> {
    serde_json::to_vec(body).map_err(LlmError::Payload)
}

/// Map one HTTP reply onto the attempt outcome.
pub fn classify(reply: HttpReply, malformed_fallback: Option<Duration>) -> CallOutcome {
    match reply.status {
        200 => match ChatResponse::first_content(&reply.body) {
            Ok(content) => CallOutcome::Success(content),
            Err(err) => CallOutcome::TransientError(err),
        },
        429 => match parse_retry_after(reply.retry_after.as_deref()) {
            Some(delay) => CallOutcome::rate_limited(delay),
            None => {
                let cause = LlmError::RateLimitHeaderMalformed {
                    header: reply.retry_after,
                };
                match malformed_fallback {
                    Some(delay) => CallOutcome::RateLimited { delay, cause },
                    None => CallOutcome::TransientError(cause),
                }
            }
        },
        status => CallOutcome::TransientError(LlmError::UnexpectedStatus {
            status,
            body: String::from_utf8_lossy(&reply.body).into_owned(),
        }),
    }
}

/// `retry-after` as a base-10 count of seconds. HTTP-date values are not
/// supported and count as malformed.
fn parse_retry_after(header: Option<&str>) -> Option<Duration> {
    header?.trim().parse::<u64>().ok().map(Duration::from_secs)
}
