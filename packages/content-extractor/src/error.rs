//! Typed errors for the content extractor.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("document is empty")]
    Empty,

    #[error("PDF parsing failed: {0}")]
    Pdf(String),
}

pub type Result<T> = std::result::Result<T, ExtractError>;
