use thiserror::Error;

/// Failures talking to the job board API.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("job board request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status code {status} from {url}: {body}")]
    Status { status: u16, url: String, body: String },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}
