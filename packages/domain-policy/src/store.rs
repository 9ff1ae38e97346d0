//! Concurrent, lazily-populated map of [`DomainPolicy`] by host —
//! each entry is created on first request to that host.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

use crate::breaker::FailureClass;
use crate::domain_state::DomainPolicy;

#[derive(Clone, Default)]
pub struct DomainPolicyStore {
    domains: Arc<DashMap<String, DomainPolicy>>,
}

impl DomainPolicyStore {
    pub fn new() -> Self {
        Self {
            domains: Arc::new(DashMap::new()),
        }
    }

    /// Whether a fetch to `domain` is currently admitted by the breaker.
    pub fn is_request_admitted(&self, domain: &str) -> bool {
        self.domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainPolicy::new(domain))
            .is_request_admitted(Utc::now())
    }

    pub fn record_success(&self, domain: &str, used_tor: bool) {
        self.domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainPolicy::new(domain))
            .record_success(used_tor, Utc::now());
    }

    pub fn record_failure(&self, domain: &str, class: FailureClass, used_tor: bool) {
        self.domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainPolicy::new(domain))
            .record_failure(class, used_tor, Utc::now());
    }

    pub fn record_headful_used(&self, domain: &str) {
        self.domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainPolicy::new(domain))
            .record_headful_used();
    }

    pub fn snapshot(&self, domain: &str) -> Option<DomainPolicy> {
        self.domains.get(domain).map(|entry| entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_domain_is_admitted() {
        let store = DomainPolicyStore::new();
        assert!(store.is_request_admitted("new.example"));
    }

    #[test]
    fn breaker_trips_after_failures_and_blocks_admission() {
        let store = DomainPolicyStore::new();
        store.record_failure("flaky.example", FailureClass::Forbidden, false);
        store.record_failure("flaky.example", FailureClass::Forbidden, false);
        assert!(!store.is_request_admitted("flaky.example"));
    }
}
