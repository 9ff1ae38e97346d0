//! Per-domain circuit breaker FSM.
//!
//! `closed -> open` on repeated diagnosable failures; `open ->
//! half-open` once `cooldown_until` elapses; `half-open` resolves to
//! `closed` on success or back to `open` on failure.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Failure classes that count toward tripping the breaker. Other
/// failures (DNS errors, generic transport errors) do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    TooManyRequests,
    Forbidden,
    TlsHandshake,
    CloudflareChallenge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Consecutive failures before the breaker trips from `closed` to `open`.
const TRIP_THRESHOLD: u32 = 2;

/// `cooldown(n) = min(30min * 2^(n/3), 120min)`.
fn cooldown_for(consecutive_failures: u32) -> Duration {
    let doublings = consecutive_failures / 3;
    let minutes = (30i64.saturating_mul(1i64 << doublings.min(10))).min(120);
    Duration::minutes(minutes)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breaker {
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl Default for Breaker {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            cooldown_until: None,
        }
    }
}

impl Breaker {
    /// Whether a request may currently be admitted for this domain.
    pub fn is_request_admitted(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => self.cooldown_until.map_or(true, |until| now >= until),
        }
    }

    /// Transition the breaker as if its probe/request had `now` as its
    /// completion time, returning the state it settles into.
    fn enter_half_open_if_ready(&mut self, now: DateTime<Utc>) {
        if self.state == BreakerState::Open {
            if let Some(until) = self.cooldown_until {
                if now >= until {
                    self.state = BreakerState::HalfOpen;
                }
            }
        }
    }

    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.enter_half_open_if_ready(now);
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
        self.cooldown_until = None;
    }

    pub fn record_failure(&mut self, class: FailureClass, now: DateTime<Utc>) {
        self.enter_half_open_if_ready(now);

        match self.state {
            BreakerState::HalfOpen => {
                self.trip(now);
            }
            BreakerState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= TRIP_THRESHOLD {
                    self.trip(now);
                }
            }
            BreakerState::Open => {
                self.consecutive_failures += 1;
                self.cooldown_until = Some(now + cooldown_for(self.consecutive_failures));
            }
        }

        let _ = class;
    }

    fn trip(&mut self, now: DateTime<Utc>) {
        self.state = BreakerState::Open;
        self.cooldown_until = Some(now + cooldown_for(self.consecutive_failures));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_after_two_consecutive_failures() {
        let now = Utc::now();
        let mut breaker = Breaker::default();
        breaker.record_failure(FailureClass::Forbidden, now);
        assert_eq!(breaker.state, BreakerState::Closed);
        breaker.record_failure(FailureClass::Forbidden, now);
        assert_eq!(breaker.state, BreakerState::Open);
        assert!(!breaker.is_request_admitted(now));
    }

    #[test]
    fn half_opens_after_cooldown_and_closes_on_success() {
        let now = Utc::now();
        let mut breaker = Breaker::default();
        breaker.record_failure(FailureClass::Forbidden, now);
        breaker.record_failure(FailureClass::Forbidden, now);
        let later = breaker.cooldown_until.unwrap() + Duration::seconds(1);

        assert!(breaker.is_request_admitted(later));
        breaker.record_success(later);
        assert_eq!(breaker.state, BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let now = Utc::now();
        let mut breaker = Breaker::default();
        breaker.record_failure(FailureClass::Forbidden, now);
        breaker.record_failure(FailureClass::Forbidden, now);
        let later = breaker.cooldown_until.unwrap() + Duration::seconds(1);
        breaker.enter_half_open_if_ready(later);
        assert_eq!(breaker.state, BreakerState::HalfOpen);

        breaker.record_failure(FailureClass::Forbidden, later);
        assert_eq!(breaker.state, BreakerState::Open);
    }
}
