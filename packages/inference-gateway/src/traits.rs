//! The gateway's trait boundary: four operations, each hiding
//! one model transport behind a typed signature.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ExtractedClaim, NliResult, RerankedDoc};

/// Typed facade over embed / rerank / NLI / LLM-extract transports.
///
/// Implementations own retry and calibration; callers see only the
/// typed results.
#[async_trait]
pub trait InferenceGateway: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    async fn rerank(&self, query: &str, docs: &[(&str, &str)]) -> Result<Vec<RerankedDoc>>;

    async fn nli(&self, premise: &str, hypothesis: &str) -> Result<NliResult>;

    async fn extract_claims(
        &self,
        passage: &str,
        context: &str,
    ) -> Result<Vec<ExtractedClaim>>;
}
