//! Commands the [`crate::machine::SearchMachine`] emits and
//! [`crate::effects::PipelineEffect`] executes.

use domain_policy::trust::SourceTrustLevel;
use seesaw::Command;

use crate::state::SearchMetricsSnapshot;
use crate::types::{Candidate, SearchOutcome, Target};

/// One fetched candidate, carrying enough to extract fragments from.
#[derive(Debug, Clone)]
pub struct FetchedCandidate {
    pub page_id: evidence_graph::ids::PageId,
    pub url: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub source_trust_level: SourceTrustLevel,
}

/// A fragment pulled out of one fetched page, ready for ranking.
#[derive(Debug, Clone)]
pub struct RankableFragment {
    pub fragment_id: evidence_graph::ids::FragmentId,
    pub page_id: evidence_graph::ids::PageId,
    pub text: String,
    pub heading_context: Option<String>,
    pub source_trust_level: SourceTrustLevel,
}

#[derive(Debug, Clone)]
pub enum PipelineCommand {
    /// Consult SERP and academic providers in parallel for `target`.
    Plan {
        search_id: String,
        task_id: String,
        target: Target,
    },
    /// Escalating-fetch every candidate; DOI candidates take the
    /// academic fast path.
    Fetch {
        search_id: String,
        task_id: String,
        candidates: Vec<Candidate>,
    },
    /// Partition each fetched document into fragments.
    Extract {
        search_id: String,
        task_id: String,
        pages: Vec<FetchedCandidate>,
    },
    /// BM25-ish keyword + embedding cosine fusion, then rerank top-k.
    Rank {
        search_id: String,
        query: String,
        fragments: Vec<RankableFragment>,
    },
    /// Run `extract_claims` + `nli` over the top-m ranked fragments and
    /// write the result via `add_claim_evidence`.
    ClassifyIngest {
        search_id: String,
        task_id: String,
        fragments: Vec<RankableFragment>,
    },
    /// Walk references of the ingested claims' source pages.
    ExpandCitations {
        search_id: String,
        task_id: String,
        page_ids: Vec<evidence_graph::ids::PageId>,
    },
    /// Record the terminal state of one search.
    Finalize {
        search_id: String,
        outcome: SearchOutcome,
        metrics: SearchMetricsSnapshot,
    },
}

impl Command for PipelineCommand {}
