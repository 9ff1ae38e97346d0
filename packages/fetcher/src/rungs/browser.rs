//! Browser-automation rungs.
//!
//! The actual automation process (launching and driving a browser) is
//! out of scope; these are thin adapters over a [`BrowserBackend`]
//! port plus the auto-start hook a headful fetch needs.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{FetchError, FetchResult};
use crate::traits::Fetcher;
use crate::types::{FetchContext, FetchOutcome, FetchTimings, FetchedDocument, Rung};

/// Port for whatever process actually drives a browser. A production
/// deployment implements this against a CDP client; tests use an
/// in-memory double.
#[async_trait]
pub trait BrowserBackend: Send + Sync {
    /// True once the browser process is reachable.
    async fn is_ready(&self) -> bool;

    /// Attempt to launch the browser process if it is not running.
    /// Returns once it is ready or the attempt times out.
    async fn ensure_started(&self) -> FetchResult<()>;

    /// Navigate to `url` and return the rendered document bytes plus
    /// the content type reported by the page.
    async fn render(&self, url: &str, headful: bool) -> FetchResult<(Vec<u8>, String)>;
}

struct BrowserFetcherCore {
    backend: Arc<dyn BrowserBackend>,
    headful: bool,
    rung: Rung,
}

#[async_trait]
impl Fetcher for BrowserFetcherCore {
    async fn fetch(
        &self,
        url: &str,
        _ctx: &FetchContext,
        cancel: &CancellationToken,
    ) -> FetchResult<FetchOutcome> {
        if !self.backend.is_ready().await {
            self.backend.ensure_started().await?;
        }
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled {
                url: url.to_string(),
            });
        }

        let started = Instant::now();
        let (bytes, content_type) = self.backend.render(url, self.headful).await?;
        let total_ms = started.elapsed().as_millis() as u64;

        Ok(FetchOutcome::Ok(FetchedDocument {
            bytes,
            final_url: url.to_string(),
            content_type,
            headers: Vec::new(),
            timings: FetchTimings {
                dns_ms: 0,
                connect_ms: 0,
                total_ms,
            },
            used_rung: self.rung,
        }))
    }

    fn name(&self) -> &'static str {
        if self.headful {
            "browser_headful"
        } else {
            "browser_headless"
        }
    }
}

/// Headless browser rung: tried before the headful rung because it does
/// not contend with the `gpu` slot's mutual-exclusion rule.
pub struct HeadlessBrowserFetcher(BrowserFetcherCore);

impl HeadlessBrowserFetcher {
    pub fn new(backend: Arc<dyn BrowserBackend>) -> Self {
        Self(BrowserFetcherCore {
            backend,
            headful: false,
            rung: Rung::BrowserHeadless,
        })
    }
}

#[async_trait]
impl Fetcher for HeadlessBrowserFetcher {
    async fn fetch(
        &self,
        url: &str,
        ctx: &FetchContext,
        cancel: &CancellationToken,
    ) -> FetchResult<FetchOutcome> {
        self.0.fetch(url, ctx, cancel).await
    }

    fn name(&self) -> &'static str {
        self.0.name()
    }
}

/// Headful browser rung: last resort before giving up and checking
/// archives. Mutually exclusive with the `gpu` slot at the scheduler
/// level, not enforced here.
pub struct HeadfulBrowserFetcher(BrowserFetcherCore);

impl HeadfulBrowserFetcher {
    pub fn new(backend: Arc<dyn BrowserBackend>) -> Self {
        Self(BrowserFetcherCore {
            backend,
            headful: true,
            rung: Rung::BrowserHeadful,
        })
    }
}

#[async_trait]
impl Fetcher for HeadfulBrowserFetcher {
    async fn fetch(
        &self,
        url: &str,
        ctx: &FetchContext,
        cancel: &CancellationToken,
    ) -> FetchResult<FetchOutcome> {
        self.0.fetch(url, ctx, cancel).await
    }

    fn name(&self) -> &'static str {
        self.0.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeBackend {
        ready: AtomicBool,
    }

    #[async_trait]
    impl BrowserBackend for FakeBackend {
        async fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        async fn ensure_started(&self) -> FetchResult<()> {
            self.ready.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn render(&self, _url: &str, _headful: bool) -> FetchResult<(Vec<u8>, String)> {
            Ok((b"<html></html>".to_vec(), "text/html".to_string()))
        }
    }

    #[tokio::test]
    async fn auto_starts_when_not_ready() {
        let backend = Arc::new(FakeBackend {
            ready: AtomicBool::new(false),
        });
        let fetcher = HeadlessBrowserFetcher::new(backend.clone());
        let outcome = fetcher
            .fetch(
                "https://example.com",
                &FetchContext::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, FetchOutcome::Ok(_)));
        assert!(backend.is_ready().await);
    }
}
