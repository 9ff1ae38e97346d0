//! Bayesian per-claim confidence aggregation.
//!
//! `bayes_claim_confidence(c) = E[Beta(alpha, beta)]` where `alpha = 1
//! + sum(w_i)` over cross-source `supports` edges and `beta = 1 +
//! sum(w_i)` over cross-source `refutes` edges, `w_i` the calibrated
//! NLI confidence. Neutral edges never move the posterior. Edges from
//! the same canonical source collapse to their max confidence before
//! they are counted.

use std::collections::HashMap;

use crate::types::{ClaimConfidenceSource, NliEdgeLabel};

/// Minimum per-source NLI confidence to count toward independence. A
/// per-source confidence below this threshold still moves the
/// posterior but is not counted as an independent supporting source.
pub const INDEPENDENCE_MIN_CONFIDENCE: f32 = 0.6;

/// One piece of evidence contributing to a claim's posterior.
#[derive(Debug, Clone)]
pub struct EvidenceInput {
    /// Canonical source key: a page id, or a work id when the page's
    /// DOI is known, so citations of the same paper from different
    /// pages collapse together.
    pub source_key: String,
    pub label: NliEdgeLabel,
    pub confidence_raw: f32,
}

#[derive(Debug, Clone)]
pub struct AggregationResult {
    pub alpha: f32,
    pub beta: f32,
    pub bayes_claim_confidence: f32,
    pub claim_confidence_source: ClaimConfidenceSource,
    pub independent_sources: usize,
    pub supports_count: usize,
    pub refutes_count: usize,
    pub neutral_count: usize,
}

/// Aggregate a claim's evidence into a posterior confidence.
///
/// `llm_claim_confidence_raw` is the fallback used when no supports or
/// refutes edges exist yet.
pub fn aggregate(evidence: &[EvidenceInput], llm_claim_confidence_raw: f32) -> AggregationResult {
    // Collapse duplicate edges from the same source, per label, to
    // their max confidence.
    let mut collapsed: HashMap<(String, LabelKey), f32> = HashMap::new();
    for item in evidence {
        let key = (item.source_key.clone(), LabelKey::from(item.label));
        collapsed
            .entry(key)
            .and_modify(|existing| *existing = existing.max(item.confidence_raw))
            .or_insert(item.confidence_raw);
    }

    let mut alpha = 1.0f32;
    let mut beta = 1.0f32;
    let mut supports_count = 0usize;
    let mut refutes_count = 0usize;
    let mut neutral_count = 0usize;
    let mut independent_sources: std::collections::HashSet<String> =
        std::collections::HashSet::new();

    for ((source_key, label), confidence) in &collapsed {
        match label {
            LabelKey::Supports => {
                alpha += confidence;
                supports_count += 1;
                if *confidence >= INDEPENDENCE_MIN_CONFIDENCE {
                    independent_sources.insert(source_key.clone());
                }
            }
            LabelKey::Refutes => {
                beta += confidence;
                refutes_count += 1;
                if *confidence >= INDEPENDENCE_MIN_CONFIDENCE {
                    independent_sources.insert(source_key.clone());
                }
            }
            LabelKey::Neutral => {
                neutral_count += 1;
            }
        }
    }

    if supports_count == 0 && refutes_count == 0 {
        return AggregationResult {
            alpha: 1.0,
            beta: 1.0,
            bayes_claim_confidence: llm_claim_confidence_raw,
            claim_confidence_source: ClaimConfidenceSource::LlmFallback,
            independent_sources: 0,
            supports_count,
            refutes_count,
            neutral_count,
        };
    }

    let mean = alpha / (alpha + beta);
    AggregationResult {
        alpha,
        beta,
        bayes_claim_confidence: mean,
        claim_confidence_source: ClaimConfidenceSource::BayesianAggregate,
        independent_sources: independent_sources.len(),
        supports_count,
        refutes_count,
        neutral_count,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LabelKey {
    Supports,
    Refutes,
    Neutral,
}

impl From<NliEdgeLabel> for LabelKey {
    fn from(label: NliEdgeLabel) -> Self {
        match label {
            NliEdgeLabel::Supports => LabelKey::Supports,
            NliEdgeLabel::Refutes => LabelKey::Refutes,
            NliEdgeLabel::Neutral => LabelKey::Neutral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(source: &str, label: NliEdgeLabel, confidence: f32) -> EvidenceInput {
        EvidenceInput {
            source_key: source.to_string(),
            label,
            confidence_raw: confidence,
        }
    }

    #[test]
    fn no_evidence_falls_back_to_llm_confidence() {
        let result = aggregate(&[], 0.7);
        assert_eq!(result.claim_confidence_source, ClaimConfidenceSource::LlmFallback);
        assert_eq!(result.bayes_claim_confidence, 0.7);
        assert_eq!(result.independent_sources, 0);
    }

    #[test]
    fn supports_push_confidence_above_half() {
        let evidence = vec![
            ev("page-a", NliEdgeLabel::Supports, 0.9),
            ev("page-b", NliEdgeLabel::Supports, 0.8),
        ];
        let result = aggregate(&evidence, 0.5);
        assert_eq!(result.claim_confidence_source, ClaimConfidenceSource::BayesianAggregate);
        assert!(result.bayes_claim_confidence > 0.5);
        assert_eq!(result.independent_sources, 2);
    }

    #[test]
    fn duplicate_source_collapses_to_max_confidence() {
        let evidence = vec![
            ev("page-a", NliEdgeLabel::Supports, 0.6),
            ev("page-a", NliEdgeLabel::Supports, 0.9),
        ];
        let result = aggregate(&evidence, 0.5);
        assert_eq!(result.supports_count, 1);
        assert!((result.alpha - (1.0 + 0.9)).abs() < 1e-6);
    }

    #[test]
    fn neutrals_do_not_move_posterior_alongside_mixed_evidence() {
        // 3 supports (two distinct pages, one duplicate) + 1 refute from
        // a third page + 1 neutral from a fourth.
        let evidence = vec![
            ev("page-a", NliEdgeLabel::Supports, 0.9),
            ev("page-b", NliEdgeLabel::Supports, 0.8),
            ev("page-b", NliEdgeLabel::Supports, 0.7), // duplicate of page-b, lower conf, ignored
            ev("page-c", NliEdgeLabel::Refutes, 0.85),
            ev("page-d", NliEdgeLabel::Neutral, 0.5),
        ];
        let result = aggregate(&evidence, 0.5);
        assert_eq!(result.independent_sources, 3);
        assert!(result.bayes_claim_confidence > 0.5);
        assert_eq!(result.neutral_count, 1);
    }

    #[test]
    fn low_confidence_edge_does_not_count_as_independent() {
        let evidence = vec![ev("page-a", NliEdgeLabel::Supports, 0.4)];
        let result = aggregate(&evidence, 0.5);
        assert_eq!(result.independent_sources, 0);
    }
}
