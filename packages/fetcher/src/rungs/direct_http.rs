//! Plain HTTP(S) fetch rung, backed by `reqwest`.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{FetchError, FetchResult};
use crate::traits::Fetcher;
use crate::types::{
    AuthType, BlockedKind, FetchContext, FetchOutcome, FetchTimings, FetchedDocument, Rung,
};
use crate::validator::UrlValidator;

/// Fetches a URL directly over HTTP(S), the first and cheapest rung.
pub struct DirectHttpFetcher {
    client: reqwest::Client,
    validator: UrlValidator,
    default_timeout: Duration,
}

impl DirectHttpFetcher {
    pub fn new(client: reqwest::Client, validator: UrlValidator) -> Self {
        Self {
            client,
            validator,
            default_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

#[async_trait]
impl Fetcher for DirectHttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        ctx: &FetchContext,
        cancel: &CancellationToken,
    ) -> FetchResult<FetchOutcome> {
        self.validator.validate_with_dns(url).await?;

        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled { url: url.to_string() });
        }

        let timeout = ctx.timeout.unwrap_or(self.default_timeout);
        let mut req = self.client.get(url).timeout(timeout);
        if let Some(referrer) = &ctx.referrer {
            req = req.header(reqwest::header::REFERER, referrer);
        }
        if let Some(lang) = &ctx.accept_language {
            req = req.header(reqwest::header::ACCEPT_LANGUAGE, lang);
        }
        if let Some(cookies) = &ctx.cookies {
            req = req.header(reqwest::header::COOKIE, cookies);
        }

        let started = Instant::now();
        let send = tokio::select! {
            result = req.send() => result,
            _ = cancel.cancelled() => return Err(FetchError::Cancelled { url: url.to_string() }),
        };

        let response = match send {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Err(FetchError::Timeout { url: url.to_string() })
            }
            Err(e) => {
                return Ok(FetchOutcome::TransientError { cause: e.to_string() })
            }
        };

        let status = response.status();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Ok(FetchOutcome::Blocked {
                kind: BlockedKind::RateLimited,
            });
        }
        if status == reqwest::StatusCode::FORBIDDEN {
            if looks_like_challenge(&headers) {
                return Ok(FetchOutcome::AuthRequired {
                    auth_type: AuthType::Cloudflare,
                    domain: host_of(&final_url),
                });
            }
            return Ok(FetchOutcome::Blocked {
                kind: BlockedKind::Forbidden,
            });
        }
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Ok(FetchOutcome::NotFound);
        }
        if !status.is_success() {
            return Ok(FetchOutcome::TransientError {
                cause: format!("unexpected status {status}"),
            });
        }

        let bytes = match response.bytes().await {
            Ok(b) => b.to_vec(),
            Err(e) => {
                return Ok(FetchOutcome::TransientError { cause: e.to_string() })
            }
        };

        let total_ms = started.elapsed().as_millis() as u64;
        Ok(FetchOutcome::Ok(FetchedDocument {
            bytes,
            final_url,
            content_type,
            headers,
            timings: FetchTimings {
                dns_ms: 0,
                connect_ms: 0,
                total_ms,
            },
            used_rung: Rung::DirectHttp,
        }))
    }

    fn name(&self) -> &'static str {
        "direct_http"
    }
}

fn looks_like_challenge(headers: &[(String, String)]) -> bool {
    headers
        .iter()
        .any(|(k, v)| k.eq_ignore_ascii_case("server") && v.to_ascii_lowercase().contains("cloudflare"))
}

fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}
