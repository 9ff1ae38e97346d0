//! Typed errors for the evidence graph.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("page not found: {0}")]
    PageNotFound(String),

    #[error("claim not found: {0}")]
    ClaimNotFound(String),

    #[error("fragment not found: {0}")]
    FragmentNotFound(String),

    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("referential integrity violation: {0}")]
    DanglingReference(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
