//! Facts the [`crate::effects::PipelineEffect`] reports back to the
//! bus, observed by the [`crate::machine::SearchMachine`] (and, for
//! auth items, by whatever owns the auth-wait queue).

use crate::commands::{FetchedCandidate, RankableFragment};
use crate::state::SearchMetricsSnapshot;
use crate::types::{Candidate, SearchOutcome};

/// One item that hit an auth gate during `fetch`: the current
/// rung is released and the item is reported as deferred, not failed.
#[derive(Debug, Clone)]
pub struct AuthItem {
    pub domain: String,
    pub url: String,
    pub auth_type: fetcher::AuthType,
}

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    SearchQueued {
        search_id: String,
        task_id: String,
        target: crate::types::Target,
    },
    PlanReady {
        search_id: String,
        candidates: Vec<Candidate>,
    },
    PlanEmpty {
        search_id: String,
    },
    PagesFetched {
        search_id: String,
        pages: Vec<FetchedCandidate>,
        auth_required: Vec<AuthItem>,
    },
    FragmentsExtracted {
        search_id: String,
        fragments: Vec<RankableFragment>,
    },
    FragmentsRanked {
        search_id: String,
        ranked: Vec<RankableFragment>,
    },
    ClaimsIngested {
        search_id: String,
        claims_ingested: usize,
        independent_supporting_total: usize,
        primary_supporting: bool,
        secondary_supporting: bool,
        fragments_seen_this_round: usize,
        source_page_ids: Vec<evidence_graph::ids::PageId>,
    },
    CitationsExpanded {
        search_id: String,
        new_targets: Vec<crate::types::Target>,
    },
    SearchFinalized {
        search_id: String,
        outcome: SearchOutcome,
        metrics: SearchMetricsSnapshot,
    },
}
