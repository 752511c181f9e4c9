use std::time::Duration;

use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};

use super::deadline::{Deadline, Interrupted};
use super::error::LlmError;

/// Status, `retry-after` header and raw body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: Vec<u8>,
}

/// Issues a single JSON POST bounded by a [`Deadline`].
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn post(
        &self,
        endpoint: &str,
        token: &str,
        body: &[u8],
        deadline: &Deadline,
    ) -> Result<HttpReply, LlmError>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn post(
        &self,
        endpoint: &str,
        token: &str,
        body: &[u8],
        deadline: &Deadline,
    ) -> Result<HttpReply, LlmError> {
        deadline.check().map_err(|reason| interrupted(reason, deadline))?;

        let request = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(token)
            .timeout(deadline.remaining())
            .body(body.to_vec());

        let response = deadline
            .run(request.send())
            .await
            .map_err(|reason| interrupted(reason, deadline))??;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        let body = deadline
            .run(response.bytes())
            .await
            .map_err(|reason| interrupted(reason, deadline))??;

        Ok(HttpReply {
            status,
            retry_after,
            body: body.to_vec(),
        })
    }
}

fn interrupted(reason: Interrupted, deadline: &Deadline) -> LlmError {
    match reason {
        Interrupted::Cancelled => LlmError::Cancelled,
        Interrupted::Deadline => LlmError::transport(format!(
            "{}s deadline reached before the response arrived",
            deadline.budget().as_secs()
        )),
    }
}
