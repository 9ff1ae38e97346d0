//! The `Fetcher` trait: the single contract every rung of the
//! escalation ladder implements.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::FetchResult;
use crate::types::{FetchContext, FetchOutcome};

/// One way of retrieving a document for a URL.
///
/// Implementations range from a plain HTTP client to a headful browser
/// automation adapter; callers never match on the concrete type, only
/// on the returned [`FetchOutcome`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        ctx: &FetchContext,
        cancel: &CancellationToken,
    ) -> FetchResult<FetchOutcome>;

    /// A short, human-readable name used in logs and metrics.
    fn name(&self) -> &'static str;
}
