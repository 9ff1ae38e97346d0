//! EMA-smoothed per-host policy state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::breaker::{Breaker, FailureClass};

/// Smoothing factor for the exponential moving averages below. Higher
/// weights recent observations more heavily.
const EMA_ALPHA: f64 = 0.2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainPolicy {
    pub domain: String,
    pub qps_max: f64,
    pub headful_ratio: f64,
    pub tor_success_rate: f64,
    pub captcha_rate: f64,
    pub block_score: f64,
    pub breaker: Breaker,
    pub last_successes_ema: f64,
    pub last_failures_ema: f64,
}

impl DomainPolicy {
    /// Lazily created on first request to a host.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            qps_max: 1.0,
            headful_ratio: 0.0,
            tor_success_rate: 0.5,
            captcha_rate: 0.0,
            block_score: 0.0,
            breaker: Breaker::default(),
            last_successes_ema: 0.0,
            last_failures_ema: 0.0,
        }
    }

    fn ema(previous: f64, observation: f64) -> f64 {
        EMA_ALPHA * observation + (1.0 - EMA_ALPHA) * previous
    }

    pub fn record_success(&mut self, used_tor: bool, now: DateTime<Utc>) {
        self.breaker.record_success(now);
        self.last_successes_ema = Self::ema(self.last_successes_ema, 1.0);
        self.last_failures_ema = Self::ema(self.last_failures_ema, 0.0);
        self.block_score = Self::ema(self.block_score, 0.0);
        if used_tor {
            self.tor_success_rate = Self::ema(self.tor_success_rate, 1.0);
        }
    }

    pub fn record_failure(&mut self, class: FailureClass, used_tor: bool, now: DateTime<Utc>) {
        self.breaker.record_failure(class, now);
        self.last_failures_ema = Self::ema(self.last_failures_ema, 1.0);
        self.last_successes_ema = Self::ema(self.last_successes_ema, 0.0);
        self.block_score = Self::ema(self.block_score, 1.0);
        if used_tor {
            self.tor_success_rate = Self::ema(self.tor_success_rate, 0.0);
        }
        if matches!(class, FailureClass::CloudflareChallenge) {
            self.captcha_rate = Self::ema(self.captcha_rate, 1.0);
        }
    }

    pub fn record_headful_used(&mut self) {
        self.headful_ratio = Self::ema(self.headful_ratio, 1.0);
    }

    pub fn is_request_admitted(&self, now: DateTime<Utc>) -> bool {
        self.breaker.is_request_admitted(now)
    }

    pub fn cooldown_until(&self) -> Option<DateTime<Utc>> {
        self.breaker.cooldown_until
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_moves_toward_observation() {
        let mut policy = DomainPolicy::new("example.com");
        let now = Utc::now();
        for _ in 0..20 {
            policy.record_success(false, now);
        }
        assert!(policy.last_successes_ema > 0.9);
    }

    #[test]
    fn new_domain_admits_requests() {
        let policy = DomainPolicy::new("example.com");
        assert!(policy.is_request_admitted(Utc::now()));
    }
}
