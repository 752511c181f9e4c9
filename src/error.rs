use thiserror::Error;

use crate::board::BoardError;
use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum ScribeError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("LLM reply has no <think>...</think> block to split off")]
    MissingReasoning,

    #[error("Job board error: {0}")]
    Board(#[from] BoardError),

    #[error("Enrichment API error: {0}")]
    Llm(#[from] LlmError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Database statement timed out")]
    DatabaseTimeout,

    #[error("Listing {0} is not queued for enrichment")]
    NotQueued(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
