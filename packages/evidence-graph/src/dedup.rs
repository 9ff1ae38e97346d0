//! Near-duplicate claim detection via simhash, used by
//! `add_claim_evidence` to decide whether new evidence attaches to an
//! existing claim.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Similarity threshold above which two claims are treated as the
/// same underlying assertion.
pub const SIMILARITY_THRESHOLD: f32 = 0.85;

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn shingles(text: &str, k: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < k {
        return vec![words.join(" ")];
    }
    words
        .windows(k)
        .map(|window| window.join(" "))
        .collect()
}

/// A 64-bit simhash fingerprint over word 3-grams.
pub fn simhash(text: &str) -> u64 {
    let normalized = normalize(text);
    let grams = shingles(&normalized, 3);

    let mut weights = [0i32; 64];
    for gram in &grams {
        let mut hasher = DefaultHasher::new();
        gram.hash(&mut hasher);
        let hash = hasher.finish();
        for (bit, weight) in weights.iter_mut().enumerate() {
            if hash & (1 << bit) != 0 {
                *weight += 1;
            } else {
                *weight -= 1;
            }
        }
    }

    let mut fingerprint: u64 = 0;
    for (bit, weight) in weights.iter().enumerate() {
        if *weight > 0 {
            fingerprint |= 1 << bit;
        }
    }
    fingerprint
}

/// Similarity in `[0, 1]` derived from Hamming distance between two
/// fingerprints.
pub fn similarity(a: u64, b: u64) -> f32 {
    let distance = (a ^ b).count_ones();
    1.0 - (distance as f32 / 64.0)
}

/// Whether `new_claim` should be merged into `existing_claim` rather
/// than creating a new claim node.
pub fn is_near_duplicate(existing_claim: &str, new_claim: &str) -> bool {
    similarity(simhash(existing_claim), simhash(new_claim)) >= SIMILARITY_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_is_duplicate() {
        assert!(is_near_duplicate(
            "The treaty was signed in 1991.",
            "The treaty was signed in 1991."
        ));
    }

    #[test]
    fn near_identical_text_is_duplicate() {
        assert!(is_near_duplicate(
            "The treaty was signed in 1991 by all parties.",
            "The treaty was signed in 1991, by all the parties."
        ));
    }

    #[test]
    fn unrelated_text_is_not_duplicate() {
        assert!(!is_near_duplicate(
            "The treaty was signed in 1991.",
            "Photosynthesis converts light into chemical energy."
        ));
    }
}
