//! Archive-snapshot rung: the terminal fallback when every live rung
//! has failed.

use async_trait::async_trait;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{FetchError, FetchResult};
use crate::traits::Fetcher;
use crate::types::{FetchContext, FetchOutcome, FetchTimings, FetchedDocument, Rung};

/// Looks up a Wayback-style snapshot for a URL. The availability API
/// base is injected so tests can point at a fake server.
pub struct ArchiveFetcher {
    client: reqwest::Client,
    availability_api_base: String,
}

impl ArchiveFetcher {
    pub fn new(client: reqwest::Client, availability_api_base: impl Into<String>) -> Self {
        Self {
            client,
            availability_api_base: availability_api_base.into(),
        }
    }
}

#[async_trait]
impl Fetcher for ArchiveFetcher {
    async fn fetch(
        &self,
        url: &str,
        _ctx: &FetchContext,
        cancel: &CancellationToken,
    ) -> FetchResult<FetchOutcome> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled {
                url: url.to_string(),
            });
        }

        let lookup = format!("{}?url={}", self.availability_api_base, url);
        let started = Instant::now();
        let response = match self.client.get(&lookup).send().await {
            Ok(r) => r,
            Err(e) => return Ok(FetchOutcome::TransientError { cause: e.to_string() }),
        };

        if !response.status().is_success() {
            return Ok(FetchOutcome::NotFound);
        }

        let snapshot_url = match extract_snapshot_url(&response.text().await.unwrap_or_default()) {
            Some(u) => u,
            None => return Ok(FetchOutcome::NotFound),
        };

        let doc = match self.client.get(&snapshot_url).send().await {
            Ok(r) if r.status().is_success() => r,
            _ => return Ok(FetchOutcome::NotFound),
        };

        let content_type = doc
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();
        let bytes = doc.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        let total_ms = started.elapsed().as_millis() as u64;

        Ok(FetchOutcome::Ok(FetchedDocument {
            bytes,
            final_url: snapshot_url,
            content_type,
            headers: Vec::new(),
            timings: FetchTimings {
                dns_ms: 0,
                connect_ms: 0,
                total_ms,
            },
            used_rung: Rung::Archive,
        }))
    }

    fn name(&self) -> &'static str {
        "archive"
    }
}

/// Parsing the availability API's JSON without pulling in a schema for
/// one field: `{"archived_snapshots":{"closest":{"url":"..."}}}`.
fn extract_snapshot_url(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value["archived_snapshots"]["closest"]["url"]
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_closest_snapshot() {
        let body = r#"{"archived_snapshots":{"closest":{"url":"https://web.archive.org/web/2024/https://example.com"}}}"#;
        assert_eq!(
            extract_snapshot_url(body),
            Some("https://web.archive.org/web/2024/https://example.com".to_string())
        );
    }

    #[test]
    fn missing_snapshot_returns_none() {
        assert_eq!(extract_snapshot_url("{}"), None);
    }
}
