//! Per-`search_id` state machine: plan, fetch, extract, rank,
//! classify+ingest, citation expansion.
//!
//! [`machine::SearchMachine`] decides; [`effects::PipelineEffect`]
//! executes. The two are wired together by [`build_engine`] into a
//! `seesaw::Engine` the control surface drives with `PipelineEvent`s.

pub mod commands;
pub mod effects;
pub mod error;
pub mod events;
pub mod machine;
pub mod state;
pub mod types;

pub use commands::{FetchedCandidate, PipelineCommand, RankableFragment};
pub use effects::{PipelineDeps, PipelineEffect};
pub use error::{PipelineError, Result};
pub use events::{AuthItem, PipelineEvent};
pub use machine::SearchMachine;
pub use state::SearchMetricsSnapshot;
pub use types::{Candidate, SearchOutcome, Target};

use seesaw::{EngineBuilder, EngineHandle, EventTap};

/// Default pages-fetched budget handed to a new [`SearchMachine`] when
/// the caller doesn't override one per task.
pub const DEFAULT_PAGES_BUDGET: u32 = 40;

/// Wires [`SearchMachine`] and [`PipelineEffect`] into a running
/// engine and starts it. Callers drive the resulting handle with
/// `PipelineEvent::SearchQueued` via `emit` or `emit_and_await`.
pub fn build_engine(deps: PipelineDeps, pages_budget: u32) -> EngineHandle {
    EngineBuilder::new(deps)
        .with_machine(SearchMachine::new(pages_budget))
        .with_effect::<PipelineCommand, _>(PipelineEffect)
        .build()
        .start()
}

/// Same as [`build_engine`], with an additional [`EventTap`] over
/// [`PipelineEvent`] for a caller that needs a read-model of committed
/// facts (search status, auth-queue fan-out) without inserting itself
/// into the decide/execute loop.
pub fn build_engine_with_tap<T>(deps: PipelineDeps, pages_budget: u32, tap: T) -> EngineHandle
where
    T: EventTap<PipelineEvent>,
{
    EngineBuilder::new(deps)
        .with_machine(SearchMachine::new(pages_budget))
        .with_effect::<PipelineCommand, _>(PipelineEffect)
        .with_event_tap::<PipelineEvent, _>(tap)
        .build()
        .start()
}
