//! Per-search bookkeeping the [`crate::machine::SearchMachine`] keeps
//! in memory to evaluate the stopping conditions.

use crate::types::SearchOutcome;

/// Width of a novelty window.
const NOVELTY_WINDOW_SIZE: usize = 10;
/// Minimum new-claim fraction for a window to count as novel.
const NOVELTY_MIN: f64 = 0.2;
/// Consecutive low-novelty windows before a search is `exhausted`.
const NOVELTY_STALL_LIMIT: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Queued,
    Planning,
    Fetching,
    Extracting,
    Ranking,
    ClassifyingIngesting,
    ExpandingCitations,
    Terminal(SearchOutcome),
}

/// Carried out on [`crate::commands::PipelineCommand::Finalize`] so
/// callers outside the pipeline (the control surface's `get_status`)
/// can report harvest/novelty without re-deriving them from raw
/// events.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchMetricsSnapshot {
    pub pages_fetched: u32,
    pub claims_ingested_total: u32,
    pub harvest_rate: f32,
    pub novelty_score: f32,
    pub has_primary_source: bool,
}

#[derive(Debug, Clone)]
pub struct SearchState {
    pub task_id: String,
    pub query: String,
    pub status: SearchStatus,
    pub pages_fetched: u32,
    pub pages_budget: u32,
    pub independent_supporting_sources: usize,
    pub has_primary_support: bool,
    pub has_secondary_support: bool,
    pub fragments_seen_in_window: usize,
    pub stalled_windows: u8,
    pub citation_iterations: u32,
    pub citation_iteration_cap: u32,
    pub claims_ingested_total: u32,
    pub last_novelty_ratio: f32,
}

impl SearchState {
    pub fn new(task_id: impl Into<String>, query: impl Into<String>, pages_budget: u32) -> Self {
        Self {
            task_id: task_id.into(),
            query: query.into(),
            status: SearchStatus::Queued,
            pages_fetched: 0,
            pages_budget,
            independent_supporting_sources: 0,
            has_primary_support: false,
            has_secondary_support: false,
            fragments_seen_in_window: 0,
            stalled_windows: 0,
            citation_iterations: 0,
            citation_iteration_cap: 3,
            claims_ingested_total: 0,
            last_novelty_ratio: 0.0,
        }
    }

    /// Snapshot of the running totals, taken when a search finalizes.
    pub fn metrics_snapshot(&self) -> SearchMetricsSnapshot {
        SearchMetricsSnapshot {
            pages_fetched: self.pages_fetched,
            claims_ingested_total: self.claims_ingested_total,
            harvest_rate: self.claims_ingested_total as f32 / self.pages_fetched.max(1) as f32,
            novelty_score: self.last_novelty_ratio,
            has_primary_source: self.has_primary_support,
        }
    }

    pub fn record_pages_fetched(&mut self, count: u32) {
        self.pages_fetched += count;
    }

    pub fn pages_budget_exhausted(&self) -> bool {
        self.pages_fetched >= self.pages_budget
    }

    /// Folds one round of claim-ingestion results into the running
    /// totals and returns whether this window counted as novel.
    pub fn record_ingestion_round(
        &mut self,
        independent_supporting_total: usize,
        primary: bool,
        secondary: bool,
        fragments_seen_this_round: usize,
        claims_ingested: usize,
    ) -> bool {
        self.independent_supporting_sources = independent_supporting_total;
        self.has_primary_support |= primary;
        self.has_secondary_support |= secondary;
        self.fragments_seen_in_window += fragments_seen_this_round;
        self.claims_ingested_total += claims_ingested as u32;

        let window_complete = self.fragments_seen_in_window >= NOVELTY_WINDOW_SIZE;
        let novelty_ratio = claims_ingested as f64 / fragments_seen_this_round.max(1) as f64;
        self.last_novelty_ratio = novelty_ratio as f32;
        let novel = novelty_ratio >= NOVELTY_MIN;

        if window_complete {
            self.fragments_seen_in_window = 0;
            if novel {
                self.stalled_windows = 0;
            } else {
                self.stalled_windows += 1;
            }
        }
        novel
    }

    /// Evaluates the stopping conditions; `None` means "keep going"
    /// (try citation expansion next).
    pub fn stopping_condition(&self) -> Option<SearchOutcome> {
        if self.independent_supporting_sources >= 3
            || (self.has_primary_support && self.has_secondary_support)
        {
            return Some(SearchOutcome::Satisfied);
        }
        if self.pages_budget_exhausted() || self.stalled_windows >= NOVELTY_STALL_LIMIT {
            return Some(SearchOutcome::Exhausted);
        }
        None
    }

    pub fn citation_budget_remaining(&self) -> bool {
        self.citation_iterations < self.citation_iteration_cap
    }
}
