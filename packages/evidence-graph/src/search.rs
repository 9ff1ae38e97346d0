//! Hybrid semantic + keyword search over fragments and claims, for the
//! control surface's `vector_search` command, combined with
//! Reciprocal Rank Fusion.

use std::collections::HashMap;

use crate::ids::FragmentId;

/// One fragment's result slot, returned from either the semantic or
/// the keyword leg before fusion.
#[derive(Debug, Clone)]
pub struct FragmentHit {
    pub fragment_id: FragmentId,
    pub score: f32,
}

/// RRF smoothing constant; keeps a handful of very high individual
/// ranks from dominating the fused order.
const K: f32 = 60.0;

/// Cosine similarity between two equal-length embedding vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Rank fragments in `embeddings` by cosine similarity to `query`,
/// highest first.
pub fn semantic_rank(query: &[f32], embeddings: &[(FragmentId, Vec<f32>)]) -> Vec<FragmentHit> {
    let mut hits: Vec<FragmentHit> = embeddings
        .iter()
        .map(|(id, embedding)| FragmentHit {
            fragment_id: *id,
            score: cosine_similarity(query, embedding),
        })
        .collect();
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits
}

/// Naive keyword overlap ranking: counts distinct query terms present
/// in each fragment's text, case-insensitively. Used as the lexical
/// leg of hybrid search when no full-text index is configured.
pub fn keyword_rank(query: &str, fragments: &[(FragmentId, &str)]) -> Vec<FragmentHit> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect();

    let mut hits: Vec<FragmentHit> = fragments
        .iter()
        .map(|(id, text)| {
            let lower = text.to_lowercase();
            let matched = terms.iter().filter(|term| lower.contains(term.as_str())).count();
            FragmentHit {
                fragment_id: *id,
                score: matched as f32,
            }
        })
        .filter(|hit| hit.score > 0.0)
        .collect();
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits
}

/// Fuse two ranked lists via Reciprocal Rank Fusion.
pub fn reciprocal_rank_fusion(
    semantic: &[FragmentHit],
    keyword: &[FragmentHit],
    semantic_weight: f32,
    keyword_weight: f32,
) -> Vec<FragmentHit> {
    let mut scores: HashMap<FragmentId, f32> = HashMap::new();

    for (rank, hit) in semantic.iter().enumerate() {
        let rrf_score = semantic_weight / (K + rank as f32 + 1.0);
        *scores.entry(hit.fragment_id).or_insert(0.0) += rrf_score;
    }
    for (rank, hit) in keyword.iter().enumerate() {
        let rrf_score = keyword_weight / (K + rank as f32 + 1.0);
        *scores.entry(hit.fragment_id).or_insert(0.0) += rrf_score;
    }

    let mut combined: Vec<FragmentHit> = scores
        .into_iter()
        .map(|(fragment_id, score)| FragmentHit { fragment_id, score })
        .collect();
    combined.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    combined
}

/// Run hybrid search and return the top `limit` fragments.
pub fn hybrid_search(
    query: &str,
    query_embedding: &[f32],
    embeddings: &[(FragmentId, Vec<f32>)],
    texts: &[(FragmentId, &str)],
    limit: usize,
    semantic_weight: f32,
) -> Vec<FragmentHit> {
    let semantic = semantic_rank(query_embedding, embeddings);
    let keyword = keyword_rank(query, texts);
    reciprocal_rank_fusion(&semantic, &keyword, semantic_weight, 1.0 - semantic_weight)
        .into_iter()
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_matches_known_cases() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn fusion_favors_fragment_present_in_both_legs() {
        let shared = FragmentId::new();
        let semantic_only = FragmentId::new();
        let keyword_only = FragmentId::new();

        let semantic = vec![
            FragmentHit { fragment_id: shared, score: 0.9 },
            FragmentHit { fragment_id: semantic_only, score: 0.8 },
        ];
        let keyword = vec![
            FragmentHit { fragment_id: shared, score: 5.0 },
            FragmentHit { fragment_id: keyword_only, score: 3.0 },
        ];

        let combined = reciprocal_rank_fusion(&semantic, &keyword, 0.5, 0.5);
        assert_eq!(combined[0].fragment_id, shared);
        assert_eq!(combined.len(), 3);
    }

    #[test]
    fn keyword_rank_filters_out_zero_matches() {
        let a = FragmentId::new();
        let b = FragmentId::new();
        let texts = vec![
            (a, "the treaty was ratified in 1991"),
            (b, "unrelated content about gardening"),
        ];
        let hits = keyword_rank("treaty ratified", &texts);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].fragment_id, a);
    }
}
