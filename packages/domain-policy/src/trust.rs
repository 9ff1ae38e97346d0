//! Source trust classification and the provider-429 policy
//!.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceTrustLevel {
    Primary,
    Government,
    Academic,
    Trusted,
    Low,
    Unverified,
    Blocked,
}

impl SourceTrustLevel {
    /// A page whose domain maps to `Primary`, `Government`, or
    /// `Academic`.
    pub fn is_primary_source(self) -> bool {
        matches!(
            self,
            SourceTrustLevel::Primary | SourceTrustLevel::Government | SourceTrustLevel::Academic
        )
    }
}

/// Maps a domain (or suffix) to a trust level. The mapping is config,
/// not algorithm — the exact threshold for primary source per domain
/// category is a policy decision, not a hardcoded rule.
#[derive(Debug, Clone, Default)]
pub struct TrustPolicy {
    by_suffix: HashMap<String, SourceTrustLevel>,
    default_level: Option<SourceTrustLevel>,
}

impl TrustPolicy {
    pub fn new() -> Self {
        Self {
            by_suffix: HashMap::new(),
            default_level: None,
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>, level: SourceTrustLevel) -> Self {
        self.by_suffix.insert(suffix.into(), level);
        self
    }

    pub fn with_default(mut self, level: SourceTrustLevel) -> Self {
        self.default_level = Some(level);
        self
    }

    pub fn classify(&self, domain: &str) -> SourceTrustLevel {
        self.by_suffix
            .iter()
            .filter(|(suffix, _)| domain.ends_with(suffix.as_str()))
            .max_by_key(|(suffix, _)| suffix.len())
            .map(|(_, level)| *level)
            .unwrap_or(self.default_level.unwrap_or(SourceTrustLevel::Unverified))
    }

    pub fn sensible_default() -> Self {
        Self::new()
            .with_suffix(".gov", SourceTrustLevel::Government)
            .with_suffix(".edu", SourceTrustLevel::Academic)
            .with_suffix("doi.org", SourceTrustLevel::Academic)
            .with_suffix("arxiv.org", SourceTrustLevel::Academic)
            .with_suffix("ncbi.nlm.nih.gov", SourceTrustLevel::Government)
            .with_default(SourceTrustLevel::Unverified)
    }
}

/// Policy around consecutive-429 early failure and fallback. The max
/// consecutive-429 threshold is a global default with an optional
/// per-provider override.
#[derive(Debug, Clone)]
pub struct ProviderPolicy {
    pub global_max_consecutive_429: u32,
    pub per_provider_overrides: HashMap<String, u32>,
    pub min_interval: Duration,
    pub max_wait: Duration,
}

impl Default for ProviderPolicy {
    fn default() -> Self {
        Self {
            global_max_consecutive_429: 3,
            per_provider_overrides: HashMap::new(),
            min_interval: Duration::from_millis(500),
            max_wait: Duration::from_secs(30),
        }
    }
}

impl ProviderPolicy {
    pub fn max_consecutive_429_for(&self, provider: &str) -> u32 {
        self.per_provider_overrides
            .get(provider)
            .copied()
            .unwrap_or(self.global_max_consecutive_429)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_government_domains() {
        let policy = TrustPolicy::sensible_default();
        assert_eq!(
            policy.classify("data.census.gov"),
            SourceTrustLevel::Government
        );
        assert!(policy.classify("data.census.gov").is_primary_source());
    }

    #[test]
    fn unknown_domain_defaults_to_unverified() {
        let policy = TrustPolicy::sensible_default();
        assert_eq!(
            policy.classify("random-blog.example"),
            SourceTrustLevel::Unverified
        );
    }

    #[test]
    fn provider_override_takes_precedence() {
        let mut policy = ProviderPolicy::default();
        policy.per_provider_overrides.insert("semantic_scholar".into(), 5);
        assert_eq!(policy.max_consecutive_429_for("semantic_scholar"), 5);
        assert_eq!(policy.max_consecutive_429_for("crossref"), 3);
    }
}
