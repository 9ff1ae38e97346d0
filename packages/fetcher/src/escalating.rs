//! Composes the rungs into one escalation ladder:
//! `direct_http → tor_http → browser_headless → browser_headful →
//! archive`, stopping at the first success, auth-required, or
//! not-found outcome, and only escalating on a diagnosable failure
//! class.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::FetchResult;
use crate::traits::Fetcher;
use crate::types::{BlockedKind, FetchContext, FetchOutcome, Rung};

/// One entry in the ladder: the rung implementation plus the predicate
/// that decides whether a failure on the previous rung warrants trying
/// this one.
struct LadderStep {
    rung: Rung,
    fetcher: Box<dyn Fetcher>,
}

/// A [`Fetcher`] that walks the escalation ladder itself.
pub struct EscalatingFetcher {
    steps: Vec<LadderStep>,
}

impl EscalatingFetcher {
    pub fn builder() -> EscalatingFetcherBuilder {
        EscalatingFetcherBuilder { steps: Vec::new() }
    }
}

pub struct EscalatingFetcherBuilder {
    steps: Vec<LadderStep>,
}

impl EscalatingFetcherBuilder {
    pub fn rung(mut self, rung: Rung, fetcher: Box<dyn Fetcher>) -> Self {
        self.steps.push(LadderStep { rung, fetcher });
        self
    }

    pub fn build(self) -> EscalatingFetcher {
        EscalatingFetcher { steps: self.steps }
    }
}

/// Whether a failed outcome justifies trying the next rung. DNS errors
/// and not-found results do not — escalating would not help them.
fn should_escalate(outcome: &FetchOutcome) -> bool {
    match outcome {
        FetchOutcome::Ok(_) | FetchOutcome::NotFound | FetchOutcome::AuthRequired { .. } => false,
        FetchOutcome::Blocked { kind } => {
            matches!(kind, BlockedKind::Forbidden | BlockedKind::Challenge | BlockedKind::RateLimited)
        }
        FetchOutcome::TransientError { .. } => true,
    }
}

#[async_trait]
impl Fetcher for EscalatingFetcher {
    async fn fetch(
        &self,
        url: &str,
        ctx: &FetchContext,
        cancel: &CancellationToken,
    ) -> FetchResult<FetchOutcome> {
        let mut last = FetchOutcome::NotFound;
        for step in &self.steps {
            if cancel.is_cancelled() {
                return Ok(last);
            }
            tracing::debug!(rung = ?step.rung, url, "attempting fetch rung");
            let outcome = step.fetcher.fetch(url, ctx, cancel).await?;
            let escalate = should_escalate(&outcome);
            last = outcome;
            if !escalate {
                return Ok(last);
            }
            tracing::info!(rung = ?step.rung, url, "rung failed, escalating");
        }
        Ok(last)
    }

    fn name(&self) -> &'static str {
        "escalating"
    }
}
