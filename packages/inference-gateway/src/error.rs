//! Typed errors for the inference gateway.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("response parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("model returned malformed output after retry: {0}")]
    MalformedOutput(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("request timed out")]
    Timeout,

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
