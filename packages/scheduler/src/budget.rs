//! Per-task budget guard.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Tracks page and LLM-time consumption for one task and rejects
/// admission once either budget is exhausted.
#[derive(Debug)]
pub struct TaskBudget {
    pages_used: AtomicU32,
    max_pages: u32,
    llm_millis_used: AtomicU64,
    llm_millis_budget: u64,
}

impl TaskBudget {
    pub fn new(max_pages: u32, llm_millis_budget: u64) -> Self {
        Self {
            pages_used: AtomicU32::new(0),
            max_pages,
            llm_millis_used: AtomicU64::new(0),
            llm_millis_budget,
        }
    }

    /// Returns `true` if a FETCH job can be admitted.
    pub fn admits_fetch(&self) -> bool {
        self.pages_used.load(Ordering::Relaxed) < self.max_pages
    }

    /// Returns `true` if an LLM_* job can be admitted.
    pub fn admits_llm(&self) -> bool {
        self.llm_millis_used.load(Ordering::Relaxed) < self.llm_millis_budget
    }

    pub fn record_page_fetched(&self) {
        self.pages_used.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_llm_time(&self, millis: u64) {
        self.llm_millis_used.fetch_add(millis, Ordering::Relaxed);
    }

    /// Fraction of the LLM-time budget consumed so far, in `[0, 1+)`.
    pub fn llm_fraction_used(&self) -> f64 {
        if self.llm_millis_budget == 0 {
            return 1.0;
        }
        self.llm_millis_used.load(Ordering::Relaxed) as f64 / self.llm_millis_budget as f64
    }

    /// True once either budget has crossed the warning threshold
    /// (80%), used to decide whether to emit `budget_warning`.
    pub fn is_near_exhaustion(&self) -> bool {
        let pages_fraction = if self.max_pages == 0 {
            1.0
        } else {
            self.pages_used.load(Ordering::Relaxed) as f64 / self.max_pages as f64
        };
        pages_fraction >= 0.8 || self.llm_fraction_used() >= 0.8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_rejected_once_page_budget_exhausted() {
        let budget = TaskBudget::new(2, 10_000);
        assert!(budget.admits_fetch());
        budget.record_page_fetched();
        assert!(budget.admits_fetch());
        budget.record_page_fetched();
        assert!(!budget.admits_fetch());
    }

    #[test]
    fn llm_rejected_once_time_budget_exhausted() {
        let budget = TaskBudget::new(100, 1_000);
        assert!(budget.admits_llm());
        budget.record_llm_time(1_000);
        assert!(!budget.admits_llm());
    }

    #[test]
    fn near_exhaustion_flags_at_eighty_percent() {
        let budget = TaskBudget::new(10, 10_000);
        for _ in 0..7 {
            budget.record_page_fetched();
        }
        assert!(!budget.is_near_exhaustion());
        budget.record_page_fetched();
        assert!(budget.is_near_exhaustion());
    }
}
