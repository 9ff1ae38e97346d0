//! Shared request/result shapes passed between commands and events.

use serde::{Deserialize, Serialize};

/// One of the three target shapes accepted by `queue_targets`.
/// Raw strings are never accepted — the strategist (external to the
/// executor) always names the target kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Target {
    Query { text: String },
    Url { url: String, reason: String },
    Doi { doi: String, reason: String },
}

/// A candidate produced by the `plan` step, ready for `fetch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Candidate {
    Url(String),
    Doi(String),
}

/// How a search concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchOutcome {
    Satisfied,
    Exhausted,
    Partial,
}
