//! Typed errors for the domain policy store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("domain {0} breaker is open until {1}")]
    BreakerOpen(String, chrono::DateTime<chrono::Utc>),

    #[error("rate limiter wait exceeded bound for provider {0}")]
    RateLimitWaitExceeded(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
