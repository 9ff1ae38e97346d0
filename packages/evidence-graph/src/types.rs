//! Node and edge types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ClaimId, EdgeId, FragmentId, PageId, WorkId};
use domain_policy::SourceTrustLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub url: String,
    pub domain: String,
    pub content_type: String,
    pub fetched_at: DateTime<Utc>,
    pub source_trust_level: SourceTrustLevel,
    pub canonical_work: Option<WorkId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FragmentType {
    Paragraph,
    Heading,
    List,
    Table,
    Quote,
    Figure,
    Code,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    pub id: FragmentId,
    pub page_id: PageId,
    pub text_content: String,
    pub heading_context: Option<String>,
    pub heading_hierarchy: Vec<(u8, String)>,
    pub element_index: usize,
    pub fragment_type: FragmentType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimAdoptionStatus {
    Adopted,
    Rejected,
    Restored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimConfidenceSource {
    BayesianAggregate,
    LlmFallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub task_id: String,
    pub claim_text: String,
    pub llm_claim_confidence_raw: f32,
    pub bayes_claim_confidence: f32,
    pub claim_confidence_source: ClaimConfidenceSource,
    pub claim_adoption_status: ClaimAdoptionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NliEdgeLabel {
    Supports,
    Refutes,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EdgeRelation {
    FragmentToClaim {
        nli_edge_label: NliEdgeLabel,
        nli_edge_confidence_raw: f32,
    },
    Cites {
        citation_context: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source_id: String,
    pub target_id: String,
    pub relation: EdgeRelation,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Work {
    pub id: WorkId,
    pub doi: Option<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
}

/// Returned by [`crate::EvidenceGraph::calculate_claim_confidence`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimConfidence {
    pub claim_id: ClaimId,
    pub bayes_claim_confidence: f32,
    pub llm_claim_confidence_raw: f32,
    pub claim_confidence_source: ClaimConfidenceSource,
    pub independent_sources: usize,
    pub supports_count: usize,
    pub refutes_count: usize,
    pub neutral_count: usize,
    pub alpha: f32,
    pub beta: f32,
    pub evidence: Vec<EdgeId>,
}

/// A claim with both supporting and refuting edges, as surfaced by
/// `find_contradictions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contradiction {
    pub claim_id: ClaimId,
    pub supporting: usize,
    pub refuting: usize,
}
