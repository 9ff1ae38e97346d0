//! Shared types for fetch requests and outcomes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One rung of the escalation ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rung {
    DirectHttp,
    TorHttp,
    BrowserHeadless,
    BrowserHeadful,
    Archive,
}

impl Rung {
    /// The rung that should be tried after this one fails, if any.
    pub fn next(self) -> Option<Rung> {
        match self {
            Rung::DirectHttp => Some(Rung::TorHttp),
            Rung::TorHttp => Some(Rung::BrowserHeadless),
            Rung::BrowserHeadless => Some(Rung::BrowserHeadful),
            Rung::BrowserHeadful => Some(Rung::Archive),
            Rung::Archive => None,
        }
    }
}

/// The kind of human-authentication gate a fetch ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthType {
    Cloudflare,
    Captcha,
    Login,
    Turnstile,
    Other,
}

/// The kind of block a rung reported; drives escalation to the next
/// rung.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockedKind {
    RateLimited,
    Forbidden,
    Challenge,
}

/// Request context passed to every rung.
#[derive(Debug, Clone, Default)]
pub struct FetchContext {
    pub referrer: Option<String>,
    pub cookies: Option<String>,
    pub accept_language: Option<String>,
    pub timeout: Option<Duration>,
}

/// Timing breakdown for one fetch attempt.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FetchTimings {
    pub dns_ms: u64,
    pub connect_ms: u64,
    pub total_ms: u64,
}

/// A successful fetch.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    pub final_url: String,
    pub content_type: String,
    pub headers: Vec<(String, String)>,
    pub timings: FetchTimings,
    pub used_rung: Rung,
}

/// The outcome of one fetch attempt through the ladder.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Ok(FetchedDocument),
    AuthRequired { auth_type: AuthType, domain: String },
    Blocked { kind: BlockedKind },
    NotFound,
    TransientError { cause: String },
}
