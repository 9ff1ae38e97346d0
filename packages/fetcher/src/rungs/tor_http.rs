//! HTTP(S) fetch rung over a SOCKS5 proxy (Tor), used once direct HTTP
//! has been escalation-triggered.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::FetchResult;
use crate::rungs::direct_http::DirectHttpFetcher;
use crate::traits::Fetcher;
use crate::types::{FetchContext, FetchOutcome, Rung};
use crate::validator::UrlValidator;

/// Same wire behavior as [`DirectHttpFetcher`], routed through a SOCKS5
/// proxy so the upstream sees a different egress IP.
pub struct TorHttpFetcher {
    inner: DirectHttpFetcher,
}

impl TorHttpFetcher {
    /// `proxy_url` is typically `socks5h://127.0.0.1:9050`.
    pub fn new(proxy_url: &str, validator: UrlValidator) -> reqwest::Result<Self> {
        let proxy = reqwest::Proxy::all(proxy_url)?;
        let client = reqwest::Client::builder().proxy(proxy).build()?;
        Ok(Self {
            inner: DirectHttpFetcher::new(client, validator),
        })
    }
}

#[async_trait]
impl Fetcher for TorHttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        ctx: &FetchContext,
        cancel: &CancellationToken,
    ) -> FetchResult<FetchOutcome> {
        let outcome = self.inner.fetch(url, ctx, cancel).await?;
        Ok(match outcome {
            FetchOutcome::Ok(mut doc) => {
                doc.used_rung = Rung::TorHttp;
                FetchOutcome::Ok(doc)
            }
            other => other,
        })
    }

    fn name(&self) -> &'static str {
        "tor_http"
    }
}
