//! Request/response types for the gateway's four operations.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NliLabel {
    Supports,
    Refutes,
    Neutral,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NliResult {
    pub label: NliLabel,
    pub confidence_raw: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimType {
    Factual,
    Statistical,
    Causal,
    Opinion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedClaim {
    pub claim_text: String,
    pub llm_claim_confidence_raw: f32,
    pub llm_claim_type: ClaimType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankedDoc {
    pub doc_id: String,
    pub score: f32,
}
