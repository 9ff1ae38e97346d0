//! Typed errors for the pipeline crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch error: {0}")]
    Fetch(#[from] fetcher::FetchError),

    #[error("extract error: {0}")]
    Extract(#[from] content_extractor::ExtractError),

    #[error("inference gateway error: {0}")]
    Gateway(#[from] inference_gateway::error::GatewayError),

    #[error("evidence graph error: {0}")]
    Graph(#[from] evidence_graph::error::GraphError),

    #[error("search {0} has no recorded state")]
    UnknownSearch(String),

    #[error("step timed out")]
    StepTimeout,
}

pub type Result<T> = std::result::Result<T, PipelineError>;
