pub mod client;
pub mod deadline;
pub mod error;
pub mod transport;
pub mod types;

pub use client::RateLimitedCaller;
pub use error::LlmError;
