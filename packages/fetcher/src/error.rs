//! Typed errors for the fetcher crate.

use thiserror::Error;

/// Errors that can occur while validating a URL before it is fetched.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// URL scheme not allowed (e.g. `file://`, `ftp://`).
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// Host is on the block list (localhost, metadata services, ...).
    #[error("blocked host: {0}")]
    BlockedHost(String),

    /// Resolved IP falls in a blocked CIDR range.
    #[error("blocked IP range: {0}")]
    BlockedCidr(String),

    /// URL has no host component.
    #[error("URL has no host")]
    NoHost,

    /// DNS resolution failed or raced a rebinding attempt.
    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    /// URL failed to parse.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Errors surfaced by a single fetch attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Security validation failed before any network call was made.
    #[error("security error: {0}")]
    Security(#[from] SecurityError),

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The rung timed out.
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Operation was cancelled via a `CancellationToken`.
    #[error("fetch cancelled: {url}")]
    Cancelled { url: String },

    /// No rung in the escalation ladder is configured to fetch this URL.
    #[error("no fetcher rung available for: {url}")]
    NoRungAvailable { url: String },
}

pub type SecurityResult<T> = std::result::Result<T, SecurityError>;
pub type FetchResult<T> = std::result::Result<T, FetchError>;
